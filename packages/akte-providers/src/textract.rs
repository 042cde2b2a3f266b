use color_eyre::{Result, eyre};
use serde_json::Value;

/// Calls the external text-extraction service for a stored object. The service
/// fetches the object itself by `storage_ref` and runs the strategy named by
/// `mode` (`pdf_text`, `office_convert`, `ocr`, `plain`).
pub async fn extract_text(
	cfg: &akte_config::ExtractionProviderConfig,
	storage_ref: &str,
	mime_type: &str,
	mode: &str,
) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"storage_ref": storage_ref,
		"mime_type": mime_type,
		"mode": mode,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_extraction_response(json)
}

fn parse_extraction_response(json: Value) -> Result<String> {
	json.get("text")
		.and_then(|v| v.as_str())
		.map(|text| text.to_string())
		.ok_or_else(|| eyre::eyre!("Extraction response is missing text field."))
}
