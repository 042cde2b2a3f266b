use uuid::Uuid;

use akte_service::{IngestRequest, SearchRequest, SearchScope, TemplateSearchRequest};
use akte_storage::documents;

use super::{VECTOR_DIM, harness, pseudo_vector, stub_providers};

const TEMPLATE_TEXT: &str =
	"Vorlage Kündigungsschreiben: hiermit kündigen wir das Mietverhältnis fristgerecht.";

async fn seed_templates(service: &akte_service::AkteService) -> (Uuid, Uuid) {
	let firm_template = Uuid::new_v4();
	let external_template = Uuid::new_v4();

	for (source_id, firm_authored, title) in [
		(firm_template, true, "Kanzleivorlage Kündigung"),
		(external_template, false, "Fremdvorlage Kündigung"),
	] {
		documents::register(
			&service.db.pool,
			source_id,
			None,
			"template",
			firm_authored,
			title,
			"s3://akte/vorlage.docx",
			"application/vnd.openxmlformats-officedocument.wordprocessingml.document",
		)
		.await
		.expect("Failed to register template.");
		service
			.ingest(IngestRequest { source_id, text: Some(TEMPLATE_TEXT.to_string()) })
			.await
			.expect("Ingest failed.");
	}

	(firm_template, external_template)
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn firm_templates_rank_above_identical_external_ones() {
	let Some(harness) = harness(stub_providers(VECTOR_DIM)).await else {
		eprintln!("Skipping; set AKTE_PG_DSN and AKTE_QDRANT_URL to run this test.");

		return;
	};
	let service = &harness.service;
	let (firm_template, external_template) = seed_templates(service).await;
	let response = service
		.template_search(TemplateSearchRequest {
			query_vector: pseudo_vector(TEMPLATE_TEXT, VECTOR_DIM as usize),
			limit: 10,
			min_score: 0.0,
		})
		.await
		.expect("Template search failed.");

	assert_eq!(response.items.len(), 2);
	assert_eq!(response.items[0].source_id, firm_template);
	assert!(response.items[0].firm_authored);
	assert_eq!(response.items[1].source_id, external_template);
	assert!(response.items[0].score > response.items[1].score);

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn boost_lifts_firm_templates_over_the_min_score_cut() {
	let Some(harness) = harness(stub_providers(VECTOR_DIM)).await else {
		eprintln!("Skipping; set AKTE_PG_DSN and AKTE_QDRANT_URL to run this test.");

		return;
	};
	let service = &harness.service;
	let (firm_template, _) = seed_templates(service).await;
	// Both templates match with raw similarity 1.0; only the boosted firm
	// template clears a cut above that.
	let response = service
		.template_search(TemplateSearchRequest {
			query_vector: pseudo_vector(TEMPLATE_TEXT, VECTOR_DIM as usize),
			limit: 10,
			min_score: 1.1,
		})
		.await
		.expect("Template search failed.");

	assert_eq!(response.items.len(), 1);
	assert_eq!(response.items[0].source_id, firm_template);

	harness.finish().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AKTE_PG_DSN and AKTE_QDRANT_URL to run."]
async fn templates_stay_out_of_the_hybrid_search() {
	let Some(harness) = harness(stub_providers(VECTOR_DIM)).await else {
		eprintln!("Skipping; set AKTE_PG_DSN and AKTE_QDRANT_URL to run this test.");

		return;
	};
	let service = &harness.service;

	seed_templates(service).await;

	let response = service
		.search(SearchRequest {
			query: "Kündigungsschreiben".to_string(),
			query_vector: Some(pseudo_vector(TEMPLATE_TEXT, VECTOR_DIM as usize)),
			scope: SearchScope::Firm { accessible_case_ids: Some(vec![]) },
			keyword_limit: None,
			vector_limit: None,
			top_k: None,
		})
		.await
		.expect("Search failed.");

	assert!(response.items.is_empty());

	harness.finish().await;
}
