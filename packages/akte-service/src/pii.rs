//! Fail-closed person screening for externally sourced judgments.
//!
//! One LLM call over a head+tail window of the document, JSON recovery on the
//! raw response, then the static institution whitelist. Any failure along the
//! way is an error; `has_pii: false` is only ever returned from a fully
//! successful screen.

use std::time::Duration;

use akte_config::{LlmProviderConfig, Pii};
use akte_domain::{
	PiiScreen,
	pii::{filter_institutions, first_json_object},
};

use crate::{PersonExtractor, ServiceError, ServiceResult};

pub async fn screen(
	extractor: &dyn PersonExtractor,
	cfg: &LlmProviderConfig,
	pii: &Pii,
	text: &str,
) -> ServiceResult<PiiScreen> {
	let window = screen_window(text, pii);
	let ceiling = Duration::from_millis(cfg.timeout_ms);
	// The HTTP client enforces its own timeout; this outer ceiling also covers
	// connection setup and stub providers that never complete.
	let raw = match tokio::time::timeout(ceiling, extractor.extract_persons(cfg, &window)).await {
		Ok(Ok(raw)) => raw,
		Ok(Err(err)) => {
			return Err(ServiceError::PiiGate { message: err.to_string() });
		},
		Err(_) => {
			return Err(ServiceError::PiiGate {
				message: format!("Person extraction exceeded {} ms.", cfg.timeout_ms),
			});
		},
	};
	let names = parse_person_response(&raw)
		.map_err(|message| ServiceError::PiiGate { message })?;

	Ok(filter_institutions(names))
}

/// Head and tail slice of a long document. German judgments carry the parties
/// in the rubrum at the top and the signatures at the bottom, so screening the
/// edges covers the name-bearing sections without paying for the full text.
pub(crate) fn screen_window(text: &str, pii: &Pii) -> String {
	let head_chars = pii.window_head_chars as usize;
	let tail_chars = pii.window_tail_chars as usize;
	let total = text.chars().count();

	if total <= head_chars + tail_chars {
		return text.to_string();
	}

	let head: String = text.chars().take(head_chars).collect();
	let tail: String = {
		let skip = total - tail_chars;

		text.chars().skip(skip).collect()
	};

	format!("{head}\n[...]\n{tail}")
}

/// Recovers the `persons` array from the raw assistant content. Strict JSON
/// first, then the first balanced object in case the model leaked text around
/// it.
fn parse_person_response(raw: &str) -> Result<Vec<String>, String> {
	let value: serde_json::Value = match serde_json::from_str(raw) {
		Ok(value) => value,
		Err(_) => {
			let object = first_json_object(raw)
				.ok_or_else(|| "Response contains no JSON object.".to_string())?;

			serde_json::from_str(object)
				.map_err(|err| format!("Recovered object is not valid JSON: {err}."))?
		},
	};
	let persons = value
		.get("persons")
		.and_then(|v| v.as_array())
		.ok_or_else(|| "Response object is missing the persons array.".to_string())?;

	persons
		.iter()
		.map(|entry| {
			entry
				.as_str()
				.map(|name| name.to_string())
				.ok_or_else(|| "Persons array holds a non-string entry.".to_string())
		})
		.collect()
}
