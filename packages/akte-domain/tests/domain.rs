use akte_domain::{ChunkType, ContentClass, pii};

#[test]
fn chunk_type_serializes_as_snake_case() {
	assert_eq!(serde_json::to_string(&ChunkType::Standalone).unwrap(), "\"standalone\"");
	assert_eq!(serde_json::to_string(&ContentClass::CaseDocument).unwrap(), "\"case_document\"");
}

#[test]
fn screen_survives_json_round_trip() {
	let screen = pii::filter_institutions(vec![
		"Landgericht Frankfurt am Main".to_string(),
		"Dr. Anna Schmidt".to_string(),
	]);
	let raw = serde_json::to_string(&screen).unwrap();
	let back: pii::PiiScreen = serde_json::from_str(&raw).unwrap();

	assert_eq!(back, screen);
	assert_eq!(back.persons, vec!["Dr. Anna Schmidt".to_string()]);
}
