use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};

use uuid::Uuid;

use akte_service::{IngestRequest, Providers};
use akte_storage::{chunks, documents};

use super::{CannedPersons, SpyEmbedding, StubRerank, StubText, VECTOR_DIM, harness};

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn reingestion_converges_on_the_same_chunk_set() {
	let embed_calls = Arc::new(AtomicUsize::new(0));
	let providers = Providers::new(
		Arc::new(SpyEmbedding { vector_dim: VECTOR_DIM, calls: embed_calls.clone() }),
		Arc::new(StubRerank),
		Arc::new(CannedPersons {
			payload: r#"{"persons": []}"#.to_string(),
			calls: Arc::new(AtomicUsize::new(0)),
		}),
		Arc::new(StubText { text: String::new() }),
	);
	let Some(harness) = harness(providers).await else {
		eprintln!("Skipping; set AKTE_PG_DSN and AKTE_QDRANT_URL to run this test.");

		return;
	};
	let service = &harness.service;
	let source_id = Uuid::new_v4();

	documents::register(
		&service.db.pool,
		source_id,
		Some(Uuid::new_v4()),
		"case_document",
		true,
		"Schriftsatz",
		"s3://akte/schriftsatz.txt",
		"text/plain",
	)
	.await
	.expect("Failed to register document.");

	let text: String = (0..120)
		.map(|idx| format!("Der Klägervertreter hat den Schriftsatz Nummer {idx} eingereicht. "))
		.collect();
	let first = service
		.ingest(IngestRequest { source_id, text: Some(text.clone()) })
		.await
		.expect("First ingest failed.");
	let first_ids: Vec<Uuid> = chunks::for_source(&service.db.pool, source_id)
		.await
		.expect("Fetch failed.")
		.into_iter()
		.map(|chunk| chunk.chunk_id)
		.collect();
	let second = service
		.ingest(IngestRequest { source_id, text: Some(text) })
		.await
		.expect("Second ingest failed.");
	let second_ids: Vec<Uuid> = chunks::for_source(&service.db.pool, source_id)
		.await
		.expect("Fetch failed.")
		.into_iter()
		.map(|chunk| chunk.chunk_id)
		.collect();

	assert_eq!(first.inserted_chunks, second.inserted_chunks);
	assert_eq!(first_ids, second_ids);
	assert_eq!(embed_calls.load(Ordering::SeqCst), 2);

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn delete_removes_the_document_and_its_chunks() {
	let Some(harness) = harness(super::stub_providers(VECTOR_DIM)).await else {
		eprintln!("Skipping; set AKTE_PG_DSN and AKTE_QDRANT_URL to run this test.");

		return;
	};
	let service = &harness.service;
	let source_id = Uuid::new_v4();

	documents::register(
		&service.db.pool,
		source_id,
		None,
		"case_document",
		true,
		"Vermerk",
		"s3://akte/vermerk.txt",
		"text/plain",
	)
	.await
	.expect("Failed to register document.");

	service
		.ingest(IngestRequest {
			source_id,
			text: Some("Der Vermerk betrifft die Fristverlängerung im Mandat.".to_string()),
		})
		.await
		.expect("Ingest failed.");
	service.delete(source_id).await.expect("Delete failed.");

	let stored = chunks::for_source(&service.db.pool, source_id).await.expect("Fetch failed.");

	assert!(stored.is_empty());
	assert!(documents::fetch(&service.db.pool, source_id).await.is_err());
	// Deleting a document that is already gone reports NotFound.
	assert!(service.delete(source_id).await.is_err());

	harness.finish().await;
}
