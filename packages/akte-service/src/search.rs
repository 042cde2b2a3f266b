//! Hybrid retrieval: document-level German full-text search and chunk-level
//! vector search, fused with reciprocal-rank fusion, optionally reranked, and
//! assembled into a budgeted context block.

use std::collections::{HashMap, HashSet};

use qdrant_client::qdrant::{
	Condition, Filter, Query, QueryPointsBuilder, ScoredPoint, point_id::PointIdOptions,
};
use uuid::Uuid;

use akte_domain::ChunkType;
use akte_storage::{chunks, documents};

use crate::{AkteService, ServiceError, ServiceResult, embedding_version};

#[derive(Debug, Clone)]
pub enum SearchScope {
	/// One case file.
	Case(Uuid),
	/// Firm-wide search across the caller's accessible cases plus caseless
	/// firm documents. `None` means the access list could not be established;
	/// both branches then degrade to empty instead of over-returning.
	Firm { accessible_case_ids: Option<Vec<Uuid>> },
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
	pub query: String,
	/// Pre-computed query embedding; skips the embedding call when present.
	pub query_vector: Option<Vec<f32>>,
	pub scope: SearchScope,
	pub keyword_limit: Option<u32>,
	pub vector_limit: Option<u32>,
	pub top_k: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SearchItem {
	pub chunk_id: Uuid,
	pub source_id: Uuid,
	pub chunk_index: i32,
	pub content: String,
	pub context_content: String,
	pub score: f32,
	pub found_by_keyword: bool,
	pub found_by_vector: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
	pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone)]
struct Candidate {
	chunk_id: Uuid,
	source_id: Uuid,
	chunk_index: i32,
	chunk_type: String,
	parent_chunk_id: Option<Uuid>,
	text: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Fused {
	chunk_id: Uuid,
	score: f32,
	found_by_keyword: bool,
	found_by_vector: bool,
}

impl AkteService {
	pub async fn search(&self, request: SearchRequest) -> ServiceResult<SearchResponse> {
		let query = request.query.trim();

		if query.is_empty() {
			return Ok(SearchResponse::default());
		}

		let search_cfg = &self.cfg.search;
		let keyword_limit = request.keyword_limit.unwrap_or(search_cfg.keyword_limit);
		let vector_limit = request.vector_limit.unwrap_or(search_cfg.vector_limit);
		let top_k = request.top_k.unwrap_or(search_cfg.top_k).min(search_cfg.rerank_pool);
		let accessible: Option<HashSet<Uuid>> = match &request.scope {
			SearchScope::Case(case_id) => Some(HashSet::from([*case_id])),
			SearchScope::Firm { accessible_case_ids: Some(ids) } => {
				Some(ids.iter().copied().collect())
			},
			SearchScope::Firm { accessible_case_ids: None } => None,
		};
		let Some(accessible) = accessible else {
			// No established access list. Fail closed rather than search the
			// whole firm.
			return Ok(SearchResponse::default());
		};
		let query_vec = match request.query_vector {
			Some(vector) => {
				if vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
					return Err(ServiceError::InvalidRequest {
						message: "Query vector dimension mismatch.".to_string(),
					});
				}

				vector
			},
			None => self.embed_query(query).await?,
		};
		let version = embedding_version(&self.cfg);
		let keyword_case_filter: Option<Vec<Uuid>> = match &request.scope {
			SearchScope::Case(case_id) => Some(vec![*case_id]),
			// Firm scope includes caseless documents; the SQL case predicate
			// cannot express that, so hits are post-filtered instead.
			SearchScope::Firm { .. } => None,
		};
		let filter = scope_filter(&request.scope, &version);
		let (keyword_result, vector_result) = tokio::join!(
			documents::keyword_search(
				&self.db.pool,
				query,
				keyword_case_filter.as_deref(),
				keyword_limit,
			),
			self.vector_candidates(query_vec.clone(), filter, vector_limit),
		);
		let mut keyword_hits = keyword_result?;
		let vector_points = vector_result?;

		if matches!(request.scope, SearchScope::Firm { .. }) && !keyword_hits.is_empty() {
			// Never trust the index's own scoping for cross-case results.
			let hit_ids: Vec<Uuid> = keyword_hits.iter().map(|hit| hit.source_id).collect();
			let cases = documents::case_ids_for(&self.db.pool, &hit_ids).await?;

			keyword_hits.retain(|hit| match cases.get(&hit.source_id) {
				Some(Some(case_id)) => accessible.contains(case_id),
				Some(None) => true,
				None => false,
			});
		}

		let keyword_candidates = self.resolve_keyword_hits(&keyword_hits, &query_vec, &version).await?;
		let vector_candidates = self.hydrate_vector_points(&vector_points).await?;

		if keyword_candidates.is_empty() && vector_candidates.is_empty() {
			return Ok(SearchResponse::default());
		}

		let keyword_ids: Vec<Uuid> =
			keyword_candidates.iter().map(|candidate| candidate.chunk_id).collect();
		let vector_ids: Vec<Uuid> =
			vector_candidates.iter().map(|candidate| candidate.chunk_id).collect();
		let mut fused = rrf_fuse(&keyword_ids, &vector_ids, search_cfg.rrf_k);

		fused.truncate(search_cfg.rerank_pool as usize);

		let by_id: HashMap<Uuid, Candidate> = keyword_candidates
			.into_iter()
			.chain(vector_candidates)
			.map(|candidate| (candidate.chunk_id, candidate))
			.collect();
		let fused = self.rerank_pool(query, fused, &by_id).await;
		let final_ranks: Vec<&Fused> = fused.iter().take(top_k as usize).collect();
		let parent_ids: Vec<Uuid> = final_ranks
			.iter()
			.take(search_cfg.parent_context_slots as usize)
			.filter_map(|entry| by_id.get(&entry.chunk_id))
			.filter_map(|candidate| candidate.parent_chunk_id)
			.collect();
		let parent_texts = if parent_ids.is_empty() {
			HashMap::new()
		} else {
			chunks::parent_texts(&self.db.pool, &parent_ids).await?
		};
		let mut contexts = Vec::with_capacity(final_ranks.len());
		let mut items = Vec::with_capacity(final_ranks.len());

		for (rank, entry) in final_ranks.iter().enumerate() {
			let Some(candidate) = by_id.get(&entry.chunk_id) else {
				continue;
			};
			let context = context_source(
				&candidate.chunk_type,
				rank,
				search_cfg.parent_context_slots as usize,
				candidate.parent_chunk_id.and_then(|id| parent_texts.get(&id)).map(String::as_str),
				&candidate.text,
			);

			contexts.push(context);
			items.push(SearchItem {
				chunk_id: candidate.chunk_id,
				source_id: candidate.source_id,
				chunk_index: candidate.chunk_index,
				content: candidate.text.clone(),
				context_content: String::new(),
				score: entry.score,
				found_by_keyword: entry.found_by_keyword,
				found_by_vector: entry.found_by_vector,
			});
		}

		let contexts = assemble_context(contexts, search_cfg.context_char_budget as usize);

		for (item, context) in items.iter_mut().zip(contexts) {
			item.context_content = context;
		}

		Ok(SearchResponse { items })
	}

	async fn embed_query(&self, query: &str) -> ServiceResult<Vec<f32>> {
		let embeddings = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, std::slice::from_ref(&query.to_string()))
			.await?;
		let query_vec = embeddings.into_iter().next().ok_or_else(|| ServiceError::Provider {
			message: "Embedding provider returned no vectors.".to_string(),
		})?;

		if query_vec.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(ServiceError::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		Ok(query_vec)
	}

	async fn vector_candidates(
		&self,
		vector: Vec<f32>,
		filter: Filter,
		limit: u32,
	) -> ServiceResult<Vec<ScoredPoint>> {
		let search = QueryPointsBuilder::new(self.qdrant.collection.clone())
			.query(Query::new_nearest(vector))
			.filter(filter)
			.with_payload(true)
			.limit(limit as u64);
		let response = self
			.qdrant
			.client
			.query(search)
			.await
			.map_err(|err| ServiceError::Qdrant { message: err.to_string() })?;

		Ok(response.result)
	}

	/// Maps each keyword-matched document to its best searchable chunk in one
	/// bulk pgvector query. Keyword rank order is preserved; documents without
	/// a current-version embedding drop out.
	async fn resolve_keyword_hits(
		&self,
		hits: &[documents::KeywordHit],
		query_vec: &[f32],
		version: &str,
	) -> ServiceResult<Vec<Candidate>> {
		if hits.is_empty() {
			return Ok(Vec::new());
		}

		let source_ids: Vec<Uuid> = hits.iter().map(|hit| hit.source_id).collect();
		let resolved =
			chunks::best_chunk_per_document(&self.db.pool, query_vec, &source_ids, version).await?;
		let by_source: HashMap<Uuid, chunks::ResolvedChunk> =
			resolved.into_iter().map(|chunk| (chunk.source_id, chunk)).collect();
		let mut candidates = Vec::with_capacity(hits.len());
		let mut unresolved = 0_usize;

		for hit in hits {
			match by_source.get(&hit.source_id) {
				Some(chunk) => candidates.push(Candidate {
					chunk_id: chunk.chunk_id,
					source_id: chunk.source_id,
					chunk_index: chunk.chunk_index,
					chunk_type: chunk.chunk_type.clone(),
					parent_chunk_id: chunk.parent_chunk_id,
					text: chunk.text.clone(),
				}),
				None => unresolved += 1,
			}
		}

		if unresolved > 0 {
			tracing::warn!(unresolved, "Keyword hits without a current-version chunk were dropped.");
		}

		Ok(candidates)
	}

	/// Vector points carry ids and payload only; the texts live in Postgres.
	async fn hydrate_vector_points(
		&self,
		points: &[ScoredPoint],
	) -> ServiceResult<Vec<Candidate>> {
		let ordered_ids: Vec<Uuid> =
			points.iter().filter_map(|point| point_uuid(point)).collect();

		if ordered_ids.is_empty() {
			return Ok(Vec::new());
		}

		let rows = chunks::by_ids(&self.db.pool, &ordered_ids).await?;
		let by_id: HashMap<Uuid, _> = rows.into_iter().map(|row| (row.chunk_id, row)).collect();
		let mut candidates = Vec::with_capacity(ordered_ids.len());
		let mut missing = 0_usize;

		for chunk_id in ordered_ids {
			match by_id.get(&chunk_id) {
				Some(row) => candidates.push(Candidate {
					chunk_id: row.chunk_id,
					source_id: row.source_id,
					chunk_index: row.chunk_index,
					chunk_type: row.chunk_type.clone(),
					parent_chunk_id: row.parent_chunk_id,
					text: row.text.clone(),
				}),
				None => missing += 1,
			}
		}

		if missing > 0 {
			tracing::warn!(missing, "Vector points without a backing chunk row were dropped.");
		}

		Ok(candidates)
	}

	/// Best-effort quality pass over the fused pool. Any failure keeps the RRF
	/// order unchanged.
	async fn rerank_pool(
		&self,
		query: &str,
		fused: Vec<Fused>,
		by_id: &HashMap<Uuid, Candidate>,
	) -> Vec<Fused> {
		if fused.len() < 2 {
			return fused;
		}

		let texts: Vec<String> = fused
			.iter()
			.map(|entry| {
				by_id.get(&entry.chunk_id).map(|candidate| candidate.text.clone()).unwrap_or_default()
			})
			.collect();
		let docs =
			rerank_excerpts(&texts, self.cfg.search.rerank_char_budget as usize);
		let cfg = &self.cfg.providers.rerank;
		let ceiling = std::time::Duration::from_millis(cfg.timeout_ms);
		let scores = match tokio::time::timeout(
			ceiling,
			self.providers.rerank.rerank(cfg, query, &docs),
		)
		.await
		{
			Ok(Ok(scores)) if scores.len() == fused.len() => scores,
			Ok(Ok(_)) => {
				tracing::warn!("Rerank returned mismatched score count; keeping fusion order.");

				return fused;
			},
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "Rerank failed; keeping fusion order.");

				return fused;
			},
			Err(_) => {
				tracing::warn!("Rerank timed out; keeping fusion order.");

				return fused;
			},
		};
		let mut scored: Vec<Fused> = fused
			.into_iter()
			.zip(scores)
			.map(|(entry, score)| Fused { score, ..entry })
			.collect();

		// Stable sort keeps the fusion order as the tiebreak.
		scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

		scored
	}
}

/// Qdrant-side scope filter. All upserted points are searchable chunks; the
/// filter pins the scope, the searchable classes, and the current embedding
/// model so stale-version points never surface.
fn scope_filter(scope: &SearchScope, version: &str) -> Filter {
	let classes = vec!["judgment".to_string(), "case_document".to_string()];
	let mut must = vec![
		Condition::matches("content_class", classes),
		Condition::matches("model_version", version.to_string()),
	];
	let mut should = Vec::new();

	match scope {
		SearchScope::Case(case_id) => {
			must.push(Condition::matches("case_id", case_id.to_string()));
		},
		SearchScope::Firm { accessible_case_ids: Some(ids) } => {
			let id_strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();

			should.push(Condition::matches("case_id", id_strings));
			should.push(Condition::is_null("case_id"));
		},
		SearchScope::Firm { accessible_case_ids: None } => {},
	}

	Filter { must, should, ..Default::default() }
}

/// Reciprocal-rank fusion over the two candidate lists. Each 1-indexed rank
/// contributes `1/(k+rank)`; candidates in both lists sum their contributions.
/// Ties break on chunk id for a deterministic order.
fn rrf_fuse(keyword: &[Uuid], vector: &[Uuid], k: u32) -> Vec<Fused> {
	let mut by_id: HashMap<Uuid, Fused> = HashMap::new();

	for (rank, chunk_id) in keyword.iter().enumerate() {
		let entry = by_id.entry(*chunk_id).or_insert(Fused {
			chunk_id: *chunk_id,
			score: 0.0,
			found_by_keyword: false,
			found_by_vector: false,
		});

		entry.score += 1.0 / (k as f32 + rank as f32 + 1.0);
		entry.found_by_keyword = true;
	}

	for (rank, chunk_id) in vector.iter().enumerate() {
		let entry = by_id.entry(*chunk_id).or_insert(Fused {
			chunk_id: *chunk_id,
			score: 0.0,
			found_by_keyword: false,
			found_by_vector: false,
		});

		entry.score += 1.0 / (k as f32 + rank as f32 + 1.0);
		entry.found_by_vector = true;
	}

	let mut fused: Vec<Fused> = by_id.into_values().collect();

	fused.sort_by(|a, b| {
		b.score
			.partial_cmp(&a.score)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then_with(|| a.chunk_id.cmp(&b.chunk_id))
	});

	fused
}

/// Picks the context text for one ranked item. Children escalate to their
/// parent window within the first `slots` ranks; a missing parent row
/// degrades to the chunk's own content.
fn context_source(
	chunk_type: &str,
	rank: usize,
	slots: usize,
	parent_text: Option<&str>,
	own_text: &str,
) -> String {
	if chunk_type == ChunkType::Child.as_str() && rank < slots {
		if let Some(parent) = parent_text {
			return parent.to_string();
		}

		tracing::warn!(rank, "Parent chunk text is missing; using the child content.");
	}

	own_text.to_string()
}

/// Allocates one shared char budget greedily in rank order. Later items get
/// whatever remains, truncated on a char boundary; nothing goes negative and
/// no item is dropped.
fn assemble_context(contexts: Vec<String>, budget: usize) -> Vec<String> {
	let mut remaining = budget;

	contexts
		.into_iter()
		.map(|context| {
			let truncated = truncate_chars(&context, remaining);

			remaining -= truncated.chars().count();

			truncated
		})
		.collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
	text.chars().take(max_chars).collect()
}

/// Splits the rerank char budget evenly across the pool so the combined
/// payload stays bounded regardless of chunk sizes.
fn rerank_excerpts(texts: &[String], budget: usize) -> Vec<String> {
	if texts.is_empty() {
		return Vec::new();
	}

	let share = (budget / texts.len()).max(1);

	texts.iter().map(|text| truncate_chars(text, share)).collect()
}

fn point_uuid(point: &ScoredPoint) -> Option<Uuid> {
	match &point.id.as_ref()?.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}
