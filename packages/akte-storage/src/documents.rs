use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{Error, Result, models::Document};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeywordHit {
	pub source_id: Uuid,
	pub score: f32,
}

pub async fn fetch(pool: &PgPool, source_id: Uuid) -> Result<Document> {
	sqlx::query_as::<_, Document>(
		"\
SELECT source_id, case_id, content_class, firm_authored, title, storage_ref, mime_type,
	extracted_text, index_status, last_error, created_at, updated_at
FROM documents
WHERE source_id = $1",
	)
	.bind(source_id)
	.fetch_optional(pool)
	.await?
	.ok_or_else(|| Error::NotFound(format!("Document {source_id} is not registered.")))
}

/// Document-level keyword search over the German full-text index. Only fully
/// indexed documents participate; templates are served by their own search
/// path. `case_filter` restricts to the given cases; `None` searches without
/// a case predicate (the caller applies its own access filter on the hits).
pub async fn keyword_search(
	pool: &PgPool,
	query: &str,
	case_filter: Option<&[Uuid]>,
	limit: u32,
) -> Result<Vec<KeywordHit>> {
	let case_ids = case_filter.map(|ids| ids.to_vec());

	Ok(sqlx::query_as::<_, KeywordHit>(
		"\
SELECT source_id, ts_rank_cd(fts, q)::real AS score
FROM documents, websearch_to_tsquery('german', $1) q
WHERE fts @@ q
	AND index_status = 'ready'
	AND content_class <> 'template'
	AND ($2::uuid[] IS NULL OR case_id = ANY($2))
ORDER BY score DESC, source_id
LIMIT $3",
	)
	.bind(query)
	.bind(case_ids)
	.bind(limit as i64)
	.fetch_all(pool)
	.await?)
}

/// Case ownership of the given documents, for the access-control post-filter
/// on cross-case keyword hits.
pub async fn case_ids_for(
	pool: &PgPool,
	source_ids: &[Uuid],
) -> Result<HashMap<Uuid, Option<Uuid>>> {
	let rows: Vec<(Uuid, Option<Uuid>)> =
		sqlx::query_as("SELECT source_id, case_id FROM documents WHERE source_id = ANY($1)")
			.bind(source_ids)
			.fetch_all(pool)
			.await?;

	Ok(rows.into_iter().collect())
}

pub async fn set_index_status(
	pool: &PgPool,
	source_id: Uuid,
	status: &str,
	last_error: Option<&str>,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE documents
SET index_status = $2, last_error = $3, updated_at = now()
WHERE source_id = $1",
	)
	.bind(source_id)
	.bind(status)
	.bind(last_error)
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn register(
	pool: &PgPool,
	source_id: Uuid,
	case_id: Option<Uuid>,
	content_class: &str,
	firm_authored: bool,
	title: &str,
	storage_ref: &str,
	mime_type: &str,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO documents (source_id, case_id, content_class, firm_authored, title, storage_ref, mime_type)
VALUES ($1,$2,$3,$4,$5,$6,$7)
ON CONFLICT (source_id) DO UPDATE
SET case_id = EXCLUDED.case_id,
	content_class = EXCLUDED.content_class,
	firm_authored = EXCLUDED.firm_authored,
	title = EXCLUDED.title,
	storage_ref = EXCLUDED.storage_ref,
	mime_type = EXCLUDED.mime_type,
	updated_at = now()",
	)
	.bind(source_id)
	.bind(case_id)
	.bind(content_class)
	.bind(firm_authored)
	.bind(title)
	.bind(storage_ref)
	.bind(mime_type)
	.execute(pool)
	.await?;

	Ok(())
}

/// Deletes a document and its chunk rows. Qdrant points are removed by the
/// caller, which owns the vector store handle.
pub async fn delete(pool: &PgPool, source_id: Uuid) -> Result<()> {
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
	sqlx::query("DELETE FROM documents WHERE source_id = $1")
		.bind(source_id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(())
}
