use std::time::Duration as StdDuration;

use color_eyre::Result;
use time::{Duration, OffsetDateTime};
use tokio::time as tokio_time;

use akte_service::{AkteService, IngestRequest, ServiceError};
use akte_storage::{documents, jobs};

const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;
const MAX_JOB_ERROR_CHARS: usize = 1_024;

/// Polls the ingest queue forever. Jobs are claimed under a lease, so a second
/// worker instance or a crash mid-job cannot lose or double-index a document.
pub async fn run_worker(service: AkteService) -> Result<()> {
	let poll_interval = StdDuration::from_millis(service.cfg.worker.poll_interval_ms);

	tracing::info!("Ingest worker started.");

	loop {
		match process_one(&service).await {
			// Drain the queue without sleeping between jobs.
			Ok(true) => {},
			Ok(false) => tokio_time::sleep(poll_interval).await,
			Err(err) => {
				tracing::error!(error = %err, "Job processing failed.");
				tokio_time::sleep(poll_interval).await;
			},
		}
	}
}

async fn process_one(service: &AkteService) -> Result<bool> {
	let now = OffsetDateTime::now_utc();
	let Some(job) =
		jobs::claim_next(&service.db.pool, now, service.cfg.worker.claim_lease_seconds).await?
	else {
		return Ok(false);
	};
	let request = IngestRequest { source_id: job.source_id, text: job.supplied_text.clone() };

	match service.ingest(request).await {
		Ok(report) => {
			jobs::mark_done(&service.db.pool, job.job_id).await?;
			tracing::info!(
				job_id = %job.job_id,
				source_id = %job.source_id,
				inserted_chunks = report.inserted_chunks,
				"Ingest job done."
			);
		},
		Err(err) => {
			let message = sanitize_error(&err.to_string());

			if err.is_retryable() && job.attempts < service.cfg.worker.max_attempts {
				let available_at = now + Duration::milliseconds(backoff_ms(job.attempts));

				jobs::reschedule(&service.db.pool, job.job_id, &message, available_at).await?;
				tracing::warn!(
					job_id = %job.job_id,
					source_id = %job.source_id,
					attempts = job.attempts,
					error = %message,
					"Ingest job rescheduled."
				);
			} else {
				jobs::mark_failed(&service.db.pool, job.job_id, &message).await?;

				// Policy rejections already flipped the document status during
				// ingest; everything else is parked as failed here.
				if !matches!(err, ServiceError::PiiRejected { .. }) {
					documents::set_index_status(
						&service.db.pool,
						job.source_id,
						"failed",
						Some(&message),
					)
					.await?;
				}

				tracing::error!(
					job_id = %job.job_id,
					source_id = %job.source_id,
					attempts = job.attempts,
					error = %message,
					"Ingest job parked as failed."
				);
			}
		},
	}

	Ok(true)
}

/// Exponential backoff from the attempt counter, capped.
fn backoff_ms(attempts: i32) -> i64 {
	let exponent = attempts.saturating_sub(1).clamp(0, 6) as u32;

	(BASE_BACKOFF_MS << exponent).min(MAX_BACKOFF_MS)
}

/// Error notes land in an operator-facing column; keep them bounded.
fn sanitize_error(message: &str) -> String {
	if message.chars().count() <= MAX_JOB_ERROR_CHARS {
		return message.to_string();
	}

	message.chars().take(MAX_JOB_ERROR_CHARS).collect()
}
