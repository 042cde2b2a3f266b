//! Vector-only template retrieval with a post-retrieval boost for
//! firm-authored templates. No keyword branch, no rerank; Qdrant presence is
//! the readiness signal.

use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, Filter, Query, QueryPointsBuilder, ScoredPoint, Value, point_id::PointIdOptions,
	value::Kind,
};
use uuid::Uuid;

use akte_storage::chunks;

use crate::{AkteService, ServiceError, ServiceResult, embedding_version};

#[derive(Debug, Clone)]
pub struct TemplateSearchRequest {
	pub query_vector: Vec<f32>,
	pub limit: u32,
	pub min_score: f32,
}

#[derive(Debug, Clone)]
pub struct TemplateItem {
	pub chunk_id: Uuid,
	pub source_id: Uuid,
	pub chunk_index: i32,
	pub content: String,
	pub score: f32,
	pub firm_authored: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateSearchResponse {
	pub items: Vec<TemplateItem>,
}

#[derive(Debug, Clone, PartialEq)]
struct TemplateHit {
	chunk_id: Uuid,
	score: f32,
	firm_authored: bool,
}

impl AkteService {
	pub async fn template_search(
		&self,
		request: TemplateSearchRequest,
	) -> ServiceResult<TemplateSearchResponse> {
		if request.query_vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(ServiceError::InvalidRequest {
				message: "Query vector dimension mismatch.".to_string(),
			});
		}
		if request.limit == 0 {
			return Ok(TemplateSearchResponse::default());
		}

		let version = embedding_version(&self.cfg);
		let filter = Filter::must([
			Condition::matches("content_class", "template".to_string()),
			Condition::matches("model_version", version),
		]);
		// Over-fetch so the boost can promote firm templates that sit below
		// the raw-similarity cut.
		let fetch_limit = request.limit.saturating_mul(self.cfg.template_search.fetch_factor);
		let search = QueryPointsBuilder::new(self.qdrant.collection.clone())
			.query(Query::new_nearest(request.query_vector))
			.filter(filter)
			.with_payload(true)
			.limit(fetch_limit as u64);
		let response = self
			.qdrant
			.client
			.query(search)
			.await
			.map_err(|err| ServiceError::Qdrant { message: err.to_string() })?;
		let hits: Vec<TemplateHit> =
			response.result.iter().filter_map(parse_template_point).collect();
		let ranked = boost_and_rank(
			hits,
			self.cfg.template_search.firm_boost,
			request.min_score,
			request.limit as usize,
		);

		if ranked.is_empty() {
			return Ok(TemplateSearchResponse::default());
		}

		let chunk_ids: Vec<Uuid> = ranked.iter().map(|hit| hit.chunk_id).collect();
		let rows = chunks::by_ids(&self.db.pool, &chunk_ids).await?;
		let by_id: HashMap<Uuid, _> = rows.into_iter().map(|row| (row.chunk_id, row)).collect();
		let mut items = Vec::with_capacity(ranked.len());
		let mut missing = 0_usize;

		for hit in ranked {
			match by_id.get(&hit.chunk_id) {
				Some(row) => items.push(TemplateItem {
					chunk_id: row.chunk_id,
					source_id: row.source_id,
					chunk_index: row.chunk_index,
					content: row.text.clone(),
					score: hit.score,
					firm_authored: hit.firm_authored,
				}),
				None => missing += 1,
			}
		}

		if missing > 0 {
			tracing::warn!(missing, "Template points without a backing chunk row were dropped.");
		}

		Ok(TemplateSearchResponse { items })
	}
}

/// Applies the firm-authored multiplier, then filters, sorts, and truncates.
/// The boost runs before the `min_score` cut so boosted firm templates can
/// clear a threshold their raw similarity missed.
fn boost_and_rank(
	hits: Vec<TemplateHit>,
	firm_boost: f32,
	min_score: f32,
	limit: usize,
) -> Vec<TemplateHit> {
	let mut boosted: Vec<TemplateHit> = hits
		.into_iter()
		.map(|hit| {
			let score = if hit.firm_authored { hit.score * firm_boost } else { hit.score };

			TemplateHit { score, ..hit }
		})
		.filter(|hit| hit.score >= min_score)
		.collect();

	boosted.sort_by(|a, b| {
		b.score
			.partial_cmp(&a.score)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then_with(|| a.chunk_id.cmp(&b.chunk_id))
	});
	boosted.truncate(limit);

	boosted
}

fn parse_template_point(point: &ScoredPoint) -> Option<TemplateHit> {
	let chunk_id = match &point.id.as_ref()?.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok()?,
		_ => return None,
	};
	let firm_authored = payload_bool(&point.payload, "firm_authored").unwrap_or(false);

	Some(TemplateHit { chunk_id, score: point.score, firm_authored })
}

fn payload_bool(payload: &HashMap<String, Value>, key: &str) -> Option<bool> {
	match &payload.get(key)?.kind {
		Some(Kind::BoolValue(value)) => Some(*value),
		_ => None,
	}
}
