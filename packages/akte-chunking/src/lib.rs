use unicode_segmentation::UnicodeSegmentation;

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	/// Context window size. Inputs below this collapse to a single standalone
	/// chunk instead of a parent/child split.
	pub parent_chars: u32,
	/// Retrieval window size.
	pub child_chars: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChunk {
	pub chunk_index: i32,
	pub text: String,
}

/// One parent window with its child windows, or a single standalone chunk
/// (`parent: None`, exactly one child holding the entire text).
///
/// Child texts concatenate back to the parent text exactly; splitting is
/// deterministic and lossless.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkGroup {
	pub parent: Option<TextChunk>,
	pub children: Vec<TextChunk>,
}

pub fn split_text(text: &str, cfg: &ChunkingConfig) -> Vec<ChunkGroup> {
	if text.is_empty() {
		return Vec::new();
	}

	if text.chars().count() < cfg.parent_chars as usize {
		return vec![ChunkGroup {
			parent: None,
			children: vec![TextChunk { chunk_index: 0, text: text.to_string() }],
		}];
	}

	let children = split_children(text, cfg.child_chars as usize);

	group_into_parents(children, cfg.parent_chars as usize)
}

/// Greedily fills sentence-bounded segments into retrieval windows. Child
/// indexes are document-global so that derived chunk ids stay unique.
fn split_children(text: &str, child_chars: usize) -> Vec<TextChunk> {
	let mut children = Vec::new();
	let mut current = String::new();
	let mut current_chars = 0_usize;
	let mut chunk_index = 0_i32;

	for sentence in text.split_sentence_bounds() {
		for segment in hard_split(sentence, child_chars) {
			let segment_chars = segment.chars().count();

			if current_chars + segment_chars > child_chars && !current.is_empty() {
				children.push(TextChunk { chunk_index, text: std::mem::take(&mut current) });

				chunk_index += 1;
				current_chars = 0;
			}

			current.push_str(segment);
			current_chars += segment_chars;
		}
	}

	if !current.is_empty() {
		children.push(TextChunk { chunk_index, text: current });
	}

	children
}

/// Splits a single oversized sentence on char boundaries. Sentences within the
/// window pass through untouched.
fn hard_split(sentence: &str, max_chars: usize) -> Vec<&str> {
	if sentence.chars().count() <= max_chars {
		return vec![sentence];
	}

	let mut parts = Vec::new();
	let mut start = 0_usize;
	let mut chars_in_part = 0_usize;

	for (offset, _) in sentence.char_indices() {
		if chars_in_part == max_chars {
			parts.push(&sentence[start..offset]);

			start = offset;
			chars_in_part = 0;
		}

		chars_in_part += 1;
	}

	if start < sentence.len() {
		parts.push(&sentence[start..]);
	}

	parts
}

fn group_into_parents(children: Vec<TextChunk>, parent_chars: usize) -> Vec<ChunkGroup> {
	let mut groups: Vec<ChunkGroup> = Vec::new();
	let mut current: Vec<TextChunk> = Vec::new();
	let mut current_chars = 0_usize;
	let mut parent_index = 0_i32;

	for child in children {
		let child_chars = child.text.chars().count();

		if current_chars + child_chars > parent_chars && !current.is_empty() {
			groups.push(build_group(parent_index, std::mem::take(&mut current)));

			parent_index += 1;
			current_chars = 0;
		}

		current_chars += child_chars;
		current.push(child);
	}

	if !current.is_empty() {
		groups.push(build_group(parent_index, current));
	}

	groups
}

fn build_group(parent_index: i32, children: Vec<TextChunk>) -> ChunkGroup {
	let mut text = String::new();

	for child in &children {
		text.push_str(&child.text);
	}

	ChunkGroup { parent: Some(TextChunk { chunk_index: parent_index, text }), children }
}
