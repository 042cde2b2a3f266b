use std::sync::OnceLock;

use regex::Regex;

/// Outcome of screening a text window for natural-person names.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PiiScreen {
	pub persons: Vec<String>,
	pub has_pii: bool,
}

/// Static whitelist of institution name patterns. Extracted names matching any
/// of these are courts, authorities, or chambers, never natural persons, and
/// are dropped before `has_pii` is computed.
const INSTITUTION_PATTERNS: &[&str] = &[
	r"(?i)^bundes(gerichtshof|verfassungsgericht|verwaltungsgericht|arbeitsgericht|sozialgericht|finanzhof|patentgericht)",
	r"(?i)^(ober)?(landes|verwaltungs|arbeits|sozial|finanz|amts|land)gericht",
	r"(?i)^(europäischer|eu-)?gerichtshof",
	r"(?i)^(BGH|BVerfG|BVerwG|BAG|BSG|BFH|BPatG|OLG|OVG|LG|AG|ArbG|LAG|SG|LSG|FG|VG|VGH|EuGH|EGMR)\b",
	r"(?i)ministerium",
	r"(?i)^\d{0,3}\.?\s*(zivil|straf|groß[er]*)?\s*senat",
	r"(?i)kammer(\s+für|\b)",
	r"(?i)^(general)?(bundes|staats)anwaltschaft",
	r"(?i)^generalbundesanwalt",
	r"(?i)(rechtsanwalts|notar|patentanwalts|steuerberater)kammer",
	r"(?i)^(bundes|landes)(amt|behörde|agentur)",
];

fn institution_regexes() -> &'static Vec<Regex> {
	static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();

	REGEXES.get_or_init(|| {
		INSTITUTION_PATTERNS
			.iter()
			.filter_map(|pattern| match Regex::new(pattern) {
				Ok(re) => Some(re),
				Err(err) => {
					tracing::error!(error = %err, pattern, "Institution pattern failed to compile.");

					None
				},
			})
			.collect()
	})
}

pub fn is_institution(name: &str) -> bool {
	let trimmed = name.trim();

	institution_regexes().iter().any(|re| re.is_match(trimmed))
}

/// Drops whitelisted institution names and empty entries, then computes the
/// screening verdict from what remains.
pub fn filter_institutions(raw_names: Vec<String>) -> PiiScreen {
	let persons: Vec<String> = raw_names
		.into_iter()
		.map(|name| name.trim().to_string())
		.filter(|name| !name.is_empty() && !is_institution(name))
		.collect();
	let has_pii = !persons.is_empty();

	PiiScreen { persons, has_pii }
}

/// Extracts the first balanced `{...}` object from a raw model response.
///
/// Constrained decoding is requested upstream, but local models occasionally
/// leak preamble or scratch tokens around the object. Brace balancing ignores
/// braces inside JSON string literals.
pub fn first_json_object(raw: &str) -> Option<&str> {
	let start = raw.find('{')?;
	let mut depth = 0_usize;
	let mut in_string = false;
	let mut escaped = false;

	for (offset, ch) in raw[start..].char_indices() {
		if escaped {
			escaped = false;

			continue;
		}

		match ch {
			'\\' if in_string => escaped = true,
			'"' => in_string = !in_string,
			'{' if !in_string => depth += 1,
			'}' if !in_string => {
				depth -= 1;

				if depth == 0 {
					return Some(&raw[start..start + offset + ch.len_utf8()]);
				}
			},
			_ => {},
		}
	}

	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn drops_institutions_and_keeps_persons() {
		let screen = filter_institutions(vec![
			"Bundesgerichtshof".to_string(),
			"Hans Müller".to_string(),
		]);

		assert_eq!(screen.persons, vec!["Hans Müller".to_string()]);
		assert!(screen.has_pii);
	}

	#[test]
	fn all_institutions_means_no_pii() {
		let screen = filter_institutions(vec![
			"Oberlandesgericht München".to_string(),
			"BGH".to_string(),
			"2. Zivilsenat".to_string(),
			"Staatsanwaltschaft Berlin".to_string(),
			"Bundesministerium der Justiz".to_string(),
			"Rechtsanwaltskammer Hamburg".to_string(),
		]);

		assert!(screen.persons.is_empty());
		assert!(!screen.has_pii);
	}

	#[test]
	fn chamber_and_senate_references_are_whitelisted() {
		assert!(is_institution("Kammer für Handelssachen"));
		assert!(is_institution("3. Strafsenat"));
		assert!(!is_institution("Erika Mustermann"));
	}

	#[test]
	fn extracts_object_despite_preamble_and_trailer() {
		let raw = "Sure, here is the result:\n{\"persons\": [\"Hans Müller\"]}\nDone.";

		assert_eq!(first_json_object(raw), Some("{\"persons\": [\"Hans Müller\"]}"));
	}

	#[test]
	fn balances_nested_braces_and_braces_in_strings() {
		let raw = "x {\"a\": {\"b\": \"}{\"}} y";

		assert_eq!(first_json_object(raw), Some("{\"a\": {\"b\": \"}{\"}}"));
	}

	#[test]
	fn missing_object_yields_none() {
		assert_eq!(first_json_object("no json here"), None);
		assert_eq!(first_json_object("{\"unterminated\": true"), None);
	}
}
