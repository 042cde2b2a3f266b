use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub chunking: Chunking,
	#[serde(default)]
	pub pii: Pii,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub template_search: TemplateSearch,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub pii_extractor: LlmProviderConfig,
	pub extraction: ExtractionProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	#[serde(default = "default_pii_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Client config for the external text-extraction service (PDF text, OCR,
/// office-format conversion).
#[derive(Debug, Deserialize)]
pub struct ExtractionProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Chunking {
	pub parent_chars: u32,
	pub child_chars: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pii {
	pub window_head_chars: u32,
	pub window_tail_chars: u32,
}
impl Default for Pii {
	fn default() -> Self {
		Self { window_head_chars: 1_500, window_tail_chars: 1_500 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub rrf_k: u32,
	pub keyword_limit: u32,
	pub vector_limit: u32,
	pub rerank_pool: u32,
	pub rerank_char_budget: u32,
	pub top_k: u32,
	pub parent_context_slots: u32,
	pub context_char_budget: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			rrf_k: 60,
			keyword_limit: 20,
			vector_limit: 50,
			rerank_pool: 50,
			rerank_char_budget: 3_000,
			top_k: 10,
			parent_context_slots: 3,
			context_char_budget: 12_000,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TemplateSearch {
	pub fetch_factor: u32,
	pub firm_boost: f32,
}
impl Default for TemplateSearch {
	fn default() -> Self {
		Self { fetch_factor: 3, firm_boost: 1.3 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Worker {
	pub poll_interval_ms: u64,
	pub claim_lease_seconds: i64,
	pub max_attempts: i32,
}
impl Default for Worker {
	fn default() -> Self {
		Self { poll_interval_ms: 500, claim_lease_seconds: 60, max_attempts: 5 }
	}
}

fn default_pii_timeout_ms() -> u64 {
	45_000
}
