pub mod content;
pub mod pii;

pub use content::{ContentClass, ContentKind};
pub use pii::PiiScreen;

/// Kind of a stored chunk row. Only `Child` and `Standalone` chunks carry
/// embeddings and are searched directly; `Parent` chunks exist to supply
/// expanded answer context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
	Parent,
	Child,
	Standalone,
}
impl ChunkType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Parent => "parent",
			Self::Child => "child",
			Self::Standalone => "standalone",
		}
	}

	pub fn is_searchable(self) -> bool {
		matches!(self, Self::Child | Self::Standalone)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parents_are_never_searched_directly() {
		assert!(!ChunkType::Parent.is_searchable());
		assert!(ChunkType::Child.is_searchable());
		assert!(ChunkType::Standalone.is_searchable());
	}
}
