use qdrant_client::{
	Payload,
	qdrant::{Condition, DeletePointsBuilder, Filter, PointStruct, UpsertPointsBuilder},
};
use serde_json::Value;
use uuid::Uuid;

use akte_chunking::{ChunkingConfig, split_text};
use akte_domain::{ChunkType, ContentClass, ContentKind};
use akte_storage::{
	chunks::{self, ChunkInsert},
	documents,
	models::Document,
};

use crate::{AkteService, ServiceError, ServiceResult, embedding_version, pii};

const MIN_USABLE_CHARS: usize = 10;

#[derive(Debug, Clone)]
pub struct IngestRequest {
	pub source_id: Uuid,
	/// Bypasses the extraction provider when the text is already at hand, e.g.
	/// re-indexing after an embedding model change.
	pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
	pub source_id: Uuid,
	pub inserted_chunks: u64,
}

impl AkteService {
	/// Indexes one registered document end to end: extract, chunk, screen,
	/// embed, replace the stored chunk set, refresh the vector store.
	///
	/// Delete-then-insert with deterministic chunk ids makes re-runs converge
	/// on the same state, so at-least-once job delivery is safe.
	pub async fn ingest(&self, request: IngestRequest) -> ServiceResult<IngestReport> {
		let document = documents::fetch(&self.db.pool, request.source_id).await?;
		let content_class: ContentClass = document
			.content_class
			.parse()
			.map_err(|message| ServiceError::InvalidRequest { message })?;
		let text = match request.text {
			Some(text) => text,
			None => self.extract(&document).await?,
		};

		if text.trim().chars().count() < MIN_USABLE_CHARS {
			let message = format!(
				"Document {} yielded fewer than {MIN_USABLE_CHARS} usable characters.",
				document.source_id
			);

			documents::set_index_status(
				&self.db.pool,
				document.source_id,
				"failed",
				Some(&message),
			)
			.await?;

			return Err(ServiceError::ExtractionFailed { message });
		}

		let chunking = ChunkingConfig {
			parent_chars: self.cfg.chunking.parent_chars,
			child_chars: self.cfg.chunking.child_chars,
		};
		let groups = split_text(&text, &chunking);

		if content_class.requires_pii_screen() {
			let screen = pii::screen(
				self.providers.persons.as_ref(),
				&self.cfg.providers.pii_extractor,
				&self.cfg.pii,
				&text,
			)
			.await?;

			if screen.has_pii {
				let person_count = screen.persons.len();
				// Status note carries the count only; the names themselves
				// must not land in the database.
				let message = format!("Screen found {person_count} natural person(s).");

				documents::set_index_status(
					&self.db.pool,
					document.source_id,
					"rejected_pii",
					Some(&message),
				)
				.await?;

				tracing::warn!(
					source_id = %document.source_id,
					person_count,
					"Judgment rejected by the person screen."
				);

				return Err(ServiceError::PiiRejected { person_count });
			}
		}

		let rows = build_chunk_rows(document.source_id, &groups);
		let searchable: Vec<usize> = rows
			.iter()
			.enumerate()
			.filter(|(_, row)| row.chunk_type != ChunkType::Parent.as_str())
			.map(|(position, _)| position)
			.collect();
		let texts: Vec<String> =
			searchable.iter().map(|position| rows[*position].text.clone()).collect();
		let vectors =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;

		if vectors.len() != texts.len() {
			return Err(ServiceError::Provider {
				message: "Embedding provider returned mismatched vector count.".to_string(),
			});
		}

		let dim = self.cfg.storage.qdrant.vector_dim as usize;

		for vector in &vectors {
			if vector.len() != dim {
				return Err(ServiceError::Provider {
					message: "Embedding vector dimension mismatch.".to_string(),
				});
			}
		}

		let mut rows = rows;

		for (position, vector) in searchable.iter().zip(vectors.iter()) {
			rows[*position].embedding = Some(vector.clone());
		}

		let version = embedding_version(&self.cfg);
		let inserted_chunks =
			chunks::replace_for_source(&self.db.pool, document.source_id, &rows, &version, &text)
				.await?;

		self.delete_points(document.source_id).await?;
		self.upsert_points(&document, &content_class, &rows, &version).await?;

		tracing::info!(
			source_id = %document.source_id,
			content_class = content_class.as_str(),
			inserted_chunks,
			"Document indexed."
		);

		Ok(IngestReport { source_id: document.source_id, inserted_chunks })
	}

	/// Removes a document from both stores. Vector points go first so a crash
	/// between the two steps leaves no orphaned search hits.
	pub async fn delete(&self, source_id: Uuid) -> ServiceResult<()> {
		documents::fetch(&self.db.pool, source_id).await?;
		self.delete_points(source_id).await?;
		documents::delete(&self.db.pool, source_id).await?;

		tracing::info!(source_id = %source_id, "Document removed from the index.");

		Ok(())
	}

	async fn extract(&self, document: &Document) -> ServiceResult<String> {
		let kind = ContentKind::from_mime(&document.mime_type);

		self.providers
			.text
			.extract_text(
				&self.cfg.providers.extraction,
				&document.storage_ref,
				&document.mime_type,
				kind.extraction_mode(),
			)
			.await
			.map_err(|err| ServiceError::ExtractionFailed { message: err.to_string() })
	}

	async fn delete_points(&self, source_id: Uuid) -> ServiceResult<()> {
		let filter = Filter::must([Condition::matches("source_id", source_id.to_string())]);
		let delete =
			DeletePointsBuilder::new(self.qdrant.collection.clone()).points(filter).wait(true);

		self.qdrant
			.client
			.delete_points(delete)
			.await
			.map_err(|err| ServiceError::Qdrant { message: err.to_string() })?;

		Ok(())
	}

	async fn upsert_points(
		&self,
		document: &Document,
		content_class: &ContentClass,
		rows: &[ChunkInsert],
		version: &str,
	) -> ServiceResult<()> {
		let mut points = Vec::new();

		for row in rows {
			let Some(vector) = row.embedding.as_ref() else {
				continue;
			};
			let mut payload = Payload::new();

			payload.insert("source_id", document.source_id.to_string());
			payload.insert(
				"case_id",
				document.case_id.map(|case_id| Value::String(case_id.to_string())).unwrap_or(Value::Null),
			);
			payload.insert("content_class", content_class.as_str().to_string());
			payload.insert("firm_authored", document.firm_authored);
			payload.insert("chunk_type", row.chunk_type.clone());
			payload.insert("chunk_index", Value::from(i64::from(row.chunk_index)));
			payload.insert("model_version", version.to_string());

			points.push(PointStruct::new(row.chunk_id.to_string(), vector.clone(), payload));
		}

		if points.is_empty() {
			return Ok(());
		}

		self.qdrant
			.client
			.upsert_points(UpsertPointsBuilder::new(self.qdrant.collection.clone(), points).wait(true))
			.await
			.map_err(|err| ServiceError::Qdrant { message: err.to_string() })?;

		Ok(())
	}
}

/// Flattens chunk groups into insertable rows. Parents carry no embedding;
/// chunk ids derive from `(source, type, index)` and are stable across runs.
fn build_chunk_rows(source_id: Uuid, groups: &[akte_chunking::ChunkGroup]) -> Vec<ChunkInsert> {
	let mut rows = Vec::new();

	for group in groups {
		match group.parent.as_ref() {
			Some(parent) => {
				let parent_id =
					chunks::chunk_id_for(source_id, ChunkType::Parent.as_str(), parent.chunk_index);

				rows.push(ChunkInsert {
					chunk_id: parent_id,
					chunk_type: ChunkType::Parent.as_str().to_string(),
					chunk_index: parent.chunk_index,
					parent_chunk_id: None,
					text: parent.text.clone(),
					embedding: None,
				});

				for child in &group.children {
					rows.push(ChunkInsert {
						chunk_id: chunks::chunk_id_for(
							source_id,
							ChunkType::Child.as_str(),
							child.chunk_index,
						),
						chunk_type: ChunkType::Child.as_str().to_string(),
						chunk_index: child.chunk_index,
						parent_chunk_id: Some(parent_id),
						text: child.text.clone(),
						embedding: None,
					});
				}
			},
			None => {
				for child in &group.children {
					rows.push(ChunkInsert {
						chunk_id: chunks::chunk_id_for(
							source_id,
							ChunkType::Standalone.as_str(),
							child.chunk_index,
						),
						chunk_type: ChunkType::Standalone.as_str().to_string(),
						chunk_index: child.chunk_index,
						parent_chunk_id: None,
						text: child.text.clone(),
						embedding: None,
					});
				}
			},
		}
	}

	rows
}

#[cfg(test)]
mod tests {
	use akte_chunking::{ChunkGroup, TextChunk};

	use super::*;

	#[test]
	fn parent_rows_precede_their_children_and_link_back() {
		let source_id = Uuid::new_v4();
		let groups = vec![ChunkGroup {
			parent: Some(TextChunk { chunk_index: 0, text: "AB".to_string() }),
			children: vec![
				TextChunk { chunk_index: 0, text: "A".to_string() },
				TextChunk { chunk_index: 1, text: "B".to_string() },
			],
		}];
		let rows = build_chunk_rows(source_id, &groups);

		assert_eq!(rows.len(), 3);
		assert_eq!(rows[0].chunk_type, "parent");
		assert_eq!(rows[1].parent_chunk_id, Some(rows[0].chunk_id));
		assert_eq!(rows[2].parent_chunk_id, Some(rows[0].chunk_id));
	}

	#[test]
	fn standalone_groups_produce_unparented_rows() {
		let source_id = Uuid::new_v4();
		let groups = vec![ChunkGroup {
			parent: None,
			children: vec![TextChunk { chunk_index: 0, text: "Kurzer Vermerk.".to_string() }],
		}];
		let rows = build_chunk_rows(source_id, &groups);

		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].chunk_type, "standalone");
		assert_eq!(rows[0].parent_chunk_id, None);
	}

	#[test]
	fn rebuilding_rows_yields_identical_ids() {
		let source_id = Uuid::new_v4();
		let groups = vec![ChunkGroup {
			parent: Some(TextChunk { chunk_index: 0, text: "AB".to_string() }),
			children: vec![TextChunk { chunk_index: 0, text: "AB".to_string() }],
		}];
		let first: Vec<Uuid> =
			build_chunk_rows(source_id, &groups).into_iter().map(|row| row.chunk_id).collect();
		let second: Vec<Uuid> =
			build_chunk_rows(source_id, &groups).into_iter().map(|row| row.chunk_id).collect();

		assert_eq!(first, second);
	}
}
