use color_eyre::{Result, eyre};
use serde_json::Value;

const SYSTEM_PROMPT: &str = "\
Du bist ein Extraktionswerkzeug für personenbezogene Daten. Extrahiere aus dem \
übergebenen Text ausschließlich vollständige Namen natürlicher Personen. \
Gerichte, Ministerien, Kammern, Senate, Staatsanwaltschaften, Behörden und \
andere Organisationen sind keine natürlichen Personen und dürfen nicht \
aufgenommen werden. Antworte mit genau einem JSON-Objekt der Form \
{\"persons\": [\"Vorname Nachname\"]} und ohne weiteren Text.";

/// One constrained-output completion call extracting natural-person names.
///
/// Returns the raw assistant content; the caller owns JSON recovery and the
/// institution post-filter. The request enforces the configured hard timeout
/// at the HTTP client level; the caller wraps an additional ceiling around the
/// whole call.
pub async fn extract_persons(cfg: &akte_config::LlmProviderConfig, text: &str) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"response_format": { "type": "json_object" },
		"messages": [
			{ "role": "system", "content": SYSTEM_PROMPT },
			{ "role": "user", "content": text },
		],
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion_content(json)
}

fn parse_completion_content(json: Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|content| content.as_str())
		.map(|content| content.to_string())
		.ok_or_else(|| eyre::eyre!("Completion response is missing assistant content."))
}
