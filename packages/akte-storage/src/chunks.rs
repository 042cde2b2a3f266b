use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{Result, models::DocumentChunk, vector_to_pg};

/// One chunk row ready for insertion. `embedding` is present exactly for
/// searchable (child/standalone) chunks.
#[derive(Debug, Clone)]
pub struct ChunkInsert {
	pub chunk_id: Uuid,
	pub chunk_type: String,
	pub chunk_index: i32,
	pub parent_chunk_id: Option<Uuid>,
	pub text: String,
	pub embedding: Option<Vec<f32>>,
}

/// Best matching searchable chunk of one document, from the bulk resolution
/// query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResolvedChunk {
	pub source_id: Uuid,
	pub chunk_id: Uuid,
	pub chunk_index: i32,
	pub chunk_type: String,
	pub parent_chunk_id: Option<Uuid>,
	pub text: String,
	pub similarity: f32,
}

/// Replaces the full chunk set of a source in one transaction: delete old
/// rows, insert the new hierarchy and embeddings, flip the document to ready.
/// Searchers never observe a partial set; re-runs are idempotent.
pub async fn replace_for_source(
	pool: &PgPool,
	source_id: Uuid,
	chunks: &[ChunkInsert],
	embedding_version: &str,
	extracted_text: &str,
) -> Result<u64> {
	let mut tx = pool.begin().await?;

	sqlx::query(
		"\
DELETE FROM chunk_embeddings
WHERE chunk_id IN (SELECT chunk_id FROM document_chunks WHERE source_id = $1)",
	)
	.bind(source_id)
	.execute(&mut *tx)
	.await?;
	sqlx::query("DELETE FROM document_chunks WHERE source_id = $1")
		.bind(source_id)
		.execute(&mut *tx)
		.await?;

	let mut inserted = 0_u64;

	for chunk in chunks {
		sqlx::query(
			"\
INSERT INTO document_chunks (
	chunk_id,
	source_id,
	chunk_type,
	chunk_index,
	parent_chunk_id,
	text,
	embedding_version
)
VALUES ($1,$2,$3,$4,$5,$6,$7)",
		)
		.bind(chunk.chunk_id)
		.bind(source_id)
		.bind(&chunk.chunk_type)
		.bind(chunk.chunk_index)
		.bind(chunk.parent_chunk_id)
		.bind(&chunk.text)
		.bind(embedding_version)
		.execute(&mut *tx)
		.await?;

		inserted += 1;

		if let Some(vec) = chunk.embedding.as_ref() {
			sqlx::query(
				"\
INSERT INTO chunk_embeddings (chunk_id, embedding_version, embedding_dim, vec)
VALUES ($1,$2,$3,$4::vector)",
			)
			.bind(chunk.chunk_id)
			.bind(embedding_version)
			.bind(vec.len() as i32)
			.bind(vector_to_pg(vec))
			.execute(&mut *tx)
			.await?;
		}
	}

	sqlx::query(
		"\
UPDATE documents
SET extracted_text = $2, index_status = 'ready', last_error = NULL, updated_at = now()
WHERE source_id = $1",
	)
	.bind(source_id)
	.bind(extracted_text)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(inserted)
}

/// Resolves each document to its single best searchable chunk for the query
/// vector, in one bulk query. Documents without a current-version embedding
/// simply do not appear in the result.
pub async fn best_chunk_per_document(
	pool: &PgPool,
	query_vec: &[f32],
	source_ids: &[Uuid],
	embedding_version: &str,
) -> Result<Vec<ResolvedChunk>> {
	let vec_text = vector_to_pg(query_vec);

	Ok(sqlx::query_as::<_, ResolvedChunk>(
		"\
SELECT DISTINCT ON (c.source_id)
	c.source_id,
	c.chunk_id,
	c.chunk_index,
	c.chunk_type,
	c.parent_chunk_id,
	c.text,
	(1 - (e.vec <=> $1::vector))::real AS similarity
FROM document_chunks c
JOIN chunk_embeddings e ON e.chunk_id = c.chunk_id
WHERE c.source_id = ANY($2)
	AND e.embedding_version = $3
	AND c.chunk_type <> 'parent'
ORDER BY c.source_id, e.vec <=> $1::vector",
	)
	.bind(vec_text)
	.bind(source_ids)
	.bind(embedding_version)
	.fetch_all(pool)
	.await?)
}

pub async fn by_ids(pool: &PgPool, chunk_ids: &[Uuid]) -> Result<Vec<DocumentChunk>> {
	Ok(sqlx::query_as::<_, DocumentChunk>(
		"\
SELECT chunk_id, source_id, chunk_type, chunk_index, parent_chunk_id, text, embedding_version,
	created_at
FROM document_chunks
WHERE chunk_id = ANY($1)",
	)
	.bind(chunk_ids)
	.fetch_all(pool)
	.await?)
}

/// Parent texts for context assembly, keyed by parent chunk id.
pub async fn parent_texts(pool: &PgPool, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
	let rows: Vec<(Uuid, String)> = sqlx::query_as(
		"SELECT chunk_id, text FROM document_chunks WHERE chunk_id = ANY($1) AND chunk_type = 'parent'",
	)
	.bind(parent_ids)
	.fetch_all(pool)
	.await?;

	Ok(rows.into_iter().collect())
}

pub async fn for_source(pool: &PgPool, source_id: Uuid) -> Result<Vec<DocumentChunk>> {
	Ok(sqlx::query_as::<_, DocumentChunk>(
		"\
SELECT chunk_id, source_id, chunk_type, chunk_index, parent_chunk_id, text, embedding_version,
	created_at
FROM document_chunks
WHERE source_id = $1
ORDER BY chunk_type, chunk_index",
	)
	.bind(source_id)
	.fetch_all(pool)
	.await?)
}

/// Deterministic chunk id. Re-ingesting the same source yields the same ids,
/// which keeps vector-store upserts idempotent.
pub fn chunk_id_for(source_id: Uuid, chunk_type: &str, chunk_index: i32) -> Uuid {
	let name = format!("{source_id}:{chunk_type}:{chunk_index}");

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}
