use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Result, models::IngestJob};

/// Queues an ingestion job for a registered document. `supplied_text` bypasses
/// the extraction step when the content is already available as text.
pub async fn enqueue(
	pool: &PgPool,
	source_id: Uuid,
	supplied_text: Option<&str>,
) -> Result<Uuid> {
	let job_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO ingest_jobs (job_id, source_id, supplied_text, status)
VALUES ($1,$2,$3,'PENDING')",
	)
	.bind(job_id)
	.bind(source_id)
	.bind(supplied_text)
	.execute(pool)
	.await?;

	Ok(job_id)
}

/// Claims the next due job under a lease. Running jobs whose lease expired are
/// reclaimable, which covers crashed workers; at-least-once delivery is safe
/// because ingestion replaces rather than appends.
pub async fn claim_next(
	pool: &PgPool,
	now: OffsetDateTime,
	lease_seconds: i64,
) -> Result<Option<IngestJob>> {
	let lease_until = now + Duration::seconds(lease_seconds);

	Ok(sqlx::query_as::<_, IngestJob>(
		"\
UPDATE ingest_jobs
SET status = 'RUNNING', attempts = attempts + 1, available_at = $2, updated_at = $1
WHERE job_id = (
	SELECT job_id
	FROM ingest_jobs
	WHERE status IN ('PENDING', 'RUNNING') AND available_at <= $1
	ORDER BY available_at
	LIMIT 1
	FOR UPDATE SKIP LOCKED
)
RETURNING job_id, source_id, supplied_text, status, attempts, last_error, available_at,
	created_at, updated_at",
	)
	.bind(now)
	.bind(lease_until)
	.fetch_optional(pool)
	.await?)
}

pub async fn mark_done(pool: &PgPool, job_id: Uuid) -> Result<()> {
	sqlx::query(
		"UPDATE ingest_jobs SET status = 'DONE', last_error = NULL, updated_at = now() WHERE job_id = $1",
	)
	.bind(job_id)
	.execute(pool)
	.await?;

	Ok(())
}

/// Returns the job to the queue after a retryable failure.
pub async fn reschedule(
	pool: &PgPool,
	job_id: Uuid,
	error: &str,
	available_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE ingest_jobs
SET status = 'PENDING', last_error = $2, available_at = $3, updated_at = now()
WHERE job_id = $1",
	)
	.bind(job_id)
	.bind(error)
	.bind(available_at)
	.execute(pool)
	.await?;

	Ok(())
}

/// Parks the job for operator attention after exhausted retries or a
/// fail-closed error.
pub async fn mark_failed(pool: &PgPool, job_id: Uuid, error: &str) -> Result<()> {
	sqlx::query(
		"UPDATE ingest_jobs SET status = 'FAILED', last_error = $2, updated_at = now() WHERE job_id = $1",
	)
	.bind(job_id)
	.bind(error)
	.execute(pool)
	.await?;

	Ok(())
}
