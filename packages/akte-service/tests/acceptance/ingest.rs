use std::sync::{Arc, atomic::AtomicUsize};

use uuid::Uuid;

use akte_service::{IngestRequest, Providers, ServiceError};
use akte_storage::{chunks, documents};

use super::{CannedPersons, StubEmbedding, StubRerank, StubText, VECTOR_DIM, harness};

fn sample_text(chars: usize) -> String {
	let mut text = String::new();
	let mut counter = 0_usize;

	while text.chars().count() < chars {
		text.push_str(&format!("Die Kammer hat den Antrag Nummer {counter} beraten. "));

		counter += 1;
	}

	text
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn long_document_produces_linked_parent_child_hierarchy() {
	let Some(harness) = harness(super::stub_providers(VECTOR_DIM)).await else {
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
		"Beschlussentwurf",
		"s3://akte/beschluss.txt",
		"text/plain",
	)
	.await
	.expect("Failed to register document.");

	let text = sample_text(5_000);
	let report = service
		.ingest(IngestRequest { source_id, text: Some(text.clone()) })
		.await
		.expect("Ingest failed.");
	let stored = chunks::for_source(&service.db.pool, source_id).await.expect("Fetch failed.");
	let parents: Vec<_> = stored.iter().filter(|chunk| chunk.chunk_type == "parent").collect();
	let children: Vec<_> = stored.iter().filter(|chunk| chunk.chunk_type == "child").collect();

	assert_eq!(report.inserted_chunks as usize, stored.len());
	assert!(!parents.is_empty());
	assert!(children.len() > parents.len());

	let parent_ids: Vec<Uuid> = parents.iter().map(|parent| parent.chunk_id).collect();
	let version = format!("local:test-embed:{VECTOR_DIM}");

	for child in &children {
		let parent_id = child.parent_chunk_id.expect("Child chunk must link to a parent.");

		assert!(parent_ids.contains(&parent_id));
		assert_eq!(child.embedding_version, version);
	}

	let reconstructed: String =
		children.iter().map(|child| child.text.as_str()).collect();

	assert_eq!(reconstructed, text);

	let document = documents::fetch(&service.db.pool, source_id).await.expect("Fetch failed.");

	assert_eq!(document.index_status, "ready");
	assert_eq!(document.extracted_text, text);

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn judgment_naming_persons_is_rejected_and_never_stored() {
	let screen_calls = Arc::new(AtomicUsize::new(0));
	let providers = Providers::new(
		Arc::new(StubEmbedding { vector_dim: VECTOR_DIM }),
		Arc::new(StubRerank),
		Arc::new(CannedPersons {
			payload: r#"{"persons": ["Bundesgerichtshof", "Hans Müller"]}"#.to_string(),
			calls: screen_calls.clone(),
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
		None,
		"judgment",
		false,
		"BGH-Urteil",
		"s3://akte/urteil.pdf",
		"application/pdf",
	)
	.await
	.expect("Failed to register document.");

	let result =
		service.ingest(IngestRequest { source_id, text: Some(sample_text(3_000)) }).await;

	assert!(matches!(result, Err(ServiceError::PiiRejected { person_count: 1 })));
	assert_eq!(screen_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

	let stored = chunks::for_source(&service.db.pool, source_id).await.expect("Fetch failed.");

	assert!(stored.is_empty());

	let document = documents::fetch(&service.db.pool, source_id).await.expect("Fetch failed.");

	assert_eq!(document.index_status, "rejected_pii");
	// The whitelist keeps court names out of the stored note.
	assert_eq!(document.last_error.as_deref(), Some("Screen found 1 natural person(s)."));

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn judgment_naming_only_institutions_is_indexed() {
	let providers = Providers::new(
		Arc::new(StubEmbedding { vector_dim: VECTOR_DIM }),
		Arc::new(StubRerank),
		Arc::new(CannedPersons {
			payload: r#"{"persons": ["Oberlandesgericht München", "3. Strafsenat"]}"#.to_string(),
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
		None,
		"judgment",
		false,
		"OLG-Beschluss",
		"s3://akte/beschluss.pdf",
		"application/pdf",
	)
	.await
	.expect("Failed to register document.");

	let report = service
		.ingest(IngestRequest { source_id, text: Some(sample_text(3_000)) })
		.await
		.expect("Ingest failed.");

	assert!(report.inserted_chunks > 0);

	let document = documents::fetch(&service.db.pool, source_id).await.expect("Fetch failed.");

	assert_eq!(document.index_status, "ready");

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn too_short_extraction_fails_closed() {
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
		"Leere Seite",
		"s3://akte/leer.pdf",
		"application/pdf",
	)
	.await
	.expect("Failed to register document.");

	let result =
		service.ingest(IngestRequest { source_id, text: Some("   \n ".to_string()) }).await;

	assert!(matches!(result, Err(ServiceError::ExtractionFailed { .. })));

	let document = documents::fetch(&service.db.pool, source_id).await.expect("Fetch failed.");

	assert_eq!(document.index_status, "failed");

	harness.finish().await;
}
