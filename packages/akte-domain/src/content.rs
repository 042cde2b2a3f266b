use std::str::FromStr;

/// Classification of an indexed source, driving PII policy and ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
	/// Externally sourced court decision. Subject to the PII gate.
	Judgment,
	/// Firm-authored or client-cleared case document.
	CaseDocument,
	/// Firm template, searched through the boosted template path.
	Template,
}
impl ContentClass {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Judgment => "judgment",
			Self::CaseDocument => "case_document",
			Self::Template => "template",
		}
	}

	/// Judgments arrive from external publication feeds and may carry party
	/// names; firm-authored content is cleared at authoring time.
	pub fn requires_pii_screen(self) -> bool {
		matches!(self, Self::Judgment)
	}
}
impl FromStr for ContentClass {
	type Err = String;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"judgment" => Ok(Self::Judgment),
			"case_document" => Ok(Self::CaseDocument),
			"template" => Ok(Self::Template),
			other => Err(format!("Unknown content class {other:?}.")),
		}
	}
}

/// Extraction strategy dispatch, keyed on the stored MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
	Pdf,
	Office,
	Image,
	PlainText,
}
impl ContentKind {
	pub fn from_mime(mime_type: &str) -> Self {
		let mime = mime_type.trim().to_ascii_lowercase();
		let essence = mime.split(';').next().unwrap_or(&mime).trim();

		match essence {
			"application/pdf" => Self::Pdf,
			"text/plain" | "text/markdown" | "text/csv" => Self::PlainText,
			_ if essence.starts_with("image/") => Self::Image,
			"application/msword"
			| "application/vnd.oasis.opendocument.text"
			| "application/rtf" => Self::Office,
			_ if essence.starts_with("application/vnd.openxmlformats-officedocument") =>
				Self::Office,
			_ if essence.starts_with("text/") => Self::PlainText,
			// Unknown binary formats go through the office conversion path,
			// which falls back to OCR on the converted PDF.
			_ => Self::Office,
		}
	}

	/// Mode string understood by the extraction service.
	pub fn extraction_mode(self) -> &'static str {
		match self {
			Self::Pdf => "pdf_text",
			Self::Office => "office_convert",
			Self::Image => "ocr",
			Self::PlainText => "plain",
		}
	}
}
