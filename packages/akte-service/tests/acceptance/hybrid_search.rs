use uuid::Uuid;

use akte_service::{IngestRequest, SearchRequest, SearchScope};
use akte_storage::documents;

use super::{VECTOR_DIM, harness, pseudo_vector, stub_providers};

const KEYWORD_TEXT: &str =
	"Das Wegerecht des Nachbarn ist im Grundbuch als Grunddienstbarkeit eingetragen.";
const VECTOR_TEXT: &str =
	"Die Berufungsfrist endet einen Monat nach Zustellung des vollständigen Urteils.";

async fn seed_case_documents(
	service: &akte_service::AkteService,
	case_id: Uuid,
) -> (Uuid, Uuid) {
	let keyword_doc = Uuid::new_v4();
	let vector_doc = Uuid::new_v4();

	for (source_id, title, text) in [
		(keyword_doc, "Grunddienstbarkeit", KEYWORD_TEXT),
		(vector_doc, "Fristenvermerk", VECTOR_TEXT),
	] {
		documents::register(
			&service.db.pool,
			source_id,
			Some(case_id),
			"case_document",
			true,
			title,
			"s3://akte/doc.txt",
			"text/plain",
		)
		.await
		.expect("Failed to register document.");
		service
			.ingest(IngestRequest { source_id, text: Some(text.to_string()) })
			.await
			.expect("Ingest failed.");
	}

	(keyword_doc, vector_doc)
}

fn request(query: &str, scope: SearchScope) -> SearchRequest {
	SearchRequest {
		query: query.to_string(),
		query_vector: Some(pseudo_vector(VECTOR_TEXT, VECTOR_DIM as usize)),
		scope,
		keyword_limit: None,
		vector_limit: None,
		top_k: None,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn fuses_keyword_and_vector_branches() {
	let Some(harness) = harness(stub_providers(VECTOR_DIM)).await else {
		eprintln!("Skipping; set AKTE_PG_DSN and AKTE_QDRANT_URL to run this test.");

		return;
	};
	let service = &harness.service;
	let case_id = Uuid::new_v4();
	let (keyword_doc, vector_doc) = seed_case_documents(service, case_id).await;
	let response = service
		.search(request("Wegerecht", SearchScope::Case(case_id)))
		.await
		.expect("Search failed.");
	let keyword_item = response
		.items
		.iter()
		.find(|item| item.source_id == keyword_doc)
		.expect("Keyword hit missing from fused results.");
	let vector_item = response
		.items
		.iter()
		.find(|item| item.source_id == vector_doc)
		.expect("Vector hit missing from fused results.");

	assert!(keyword_item.found_by_keyword);
	assert!(vector_item.found_by_vector);
	assert!(!keyword_item.content.is_empty());
	// Standalone chunks supply their own text as context.
	assert_eq!(vector_item.context_content, vector_item.content);

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn case_scope_isolates_other_cases() {
	let Some(harness) = harness(stub_providers(VECTOR_DIM)).await else {
		eprintln!("Skipping; set AKTE_PG_DSN and AKTE_QDRANT_URL to run this test.");

		return;
	};
	let service = &harness.service;
	let case_id = Uuid::new_v4();

	seed_case_documents(service, case_id).await;

	let other_case = service
		.search(request("Wegerecht", SearchScope::Case(Uuid::new_v4())))
		.await
		.expect("Search failed.");

	assert!(other_case.items.is_empty());

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn firm_scope_honors_the_accessible_case_list() {
	let Some(harness) = harness(stub_providers(VECTOR_DIM)).await else {
		eprintln!("Skipping; set AKTE_PG_DSN and AKTE_QDRANT_URL to run this test.");

		return;
	};
	let service = &harness.service;
	let case_id = Uuid::new_v4();

	seed_case_documents(service, case_id).await;

	let accessible = service
		.search(request(
			"Wegerecht",
			SearchScope::Firm { accessible_case_ids: Some(vec![case_id]) },
		))
		.await
		.expect("Search failed.");

	assert!(!accessible.items.is_empty());

	let inaccessible = service
		.search(request(
			"Wegerecht",
			SearchScope::Firm { accessible_case_ids: Some(vec![Uuid::new_v4()]) },
		))
		.await
		.expect("Search failed.");

	assert!(inaccessible.items.is_empty());

	// No established access list degrades to an empty response.
	let unknown = service
		.search(request("Wegerecht", SearchScope::Firm { accessible_case_ids: None }))
		.await
		.expect("Search failed.");

	assert!(unknown.items.is_empty());

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn blank_query_yields_an_empty_response() {
	let Some(harness) = harness(stub_providers(VECTOR_DIM)).await else {
		eprintln!("Skipping; set AKTE_PG_DSN and AKTE_QDRANT_URL to run this test.");

		return;
	};
	let response = harness
		.service
		.search(request("   ", SearchScope::Firm { accessible_case_ids: Some(vec![]) }))
		.await
		.expect("Search failed.");

	assert!(response.items.is_empty());

	harness.finish().await;
}
