use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct Document {
	pub source_id: Uuid,
	pub case_id: Option<Uuid>,
	pub content_class: String,
	pub firm_authored: bool,
	pub title: String,
	pub storage_ref: String,
	pub mime_type: String,
	pub extracted_text: String,
	pub index_status: String,
	pub last_error: Option<String>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentChunk {
	pub chunk_id: Uuid,
	pub source_id: Uuid,
	pub chunk_type: String,
	pub chunk_index: i32,
	pub parent_chunk_id: Option<Uuid>,
	pub text: String,
	pub embedding_version: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct IngestJob {
	pub job_id: Uuid,
	pub source_id: Uuid,
	pub supplied_text: Option<String>,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
