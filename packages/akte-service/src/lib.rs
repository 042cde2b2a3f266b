pub mod ingest;
pub mod pii;
pub mod search;
pub mod template_search;

use std::{future::Future, pin::Pin, sync::Arc};

use akte_config::{
	Config, EmbeddingProviderConfig, ExtractionProviderConfig, LlmProviderConfig, ProviderConfig,
};
use akte_providers::{embedding, persons, rerank, textract};
use akte_storage::{db::Db, qdrant::QdrantStore};
pub use ingest::{IngestReport, IngestRequest};
pub use search::{SearchItem, SearchRequest, SearchResponse, SearchScope};
pub use template_search::{TemplateItem, TemplateSearchRequest, TemplateSearchResponse};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

/// Names natural persons in a text window. Returns the raw assistant content;
/// JSON recovery and the institution post-filter happen in `pii::screen`.
pub trait PersonExtractor
where
	Self: Send + Sync,
{
	fn extract_persons<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait TextExtractor
where
	Self: Send + Sync,
{
	fn extract_text<'a>(
		&'a self,
		cfg: &'a ExtractionProviderConfig,
		storage_ref: &'a str,
		mime_type: &'a str,
		mode: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	NotFound { message: String },
	ExtractionFailed { message: String },
	/// The person-screening call itself failed (timeout, malformed response).
	/// Fail closed: the document is not indexed.
	PiiGate { message: String },
	/// The screen succeeded and found natural persons. Policy rejection.
	PiiRejected { person_count: usize },
	Provider { message: String },
	Storage { message: String },
	Qdrant { message: String },
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub persons: Arc<dyn PersonExtractor>,
	pub text: Arc<dyn TextExtractor>,
}

pub struct AkteService {
	pub cfg: Config,
	pub db: Db,
	pub qdrant: QdrantStore,
	pub providers: Providers,
}

struct DefaultProviders;

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::NotFound { message } => write!(f, "Not found: {message}"),
			Self::ExtractionFailed { message } => write!(f, "Extraction failed: {message}"),
			Self::PiiGate { message } => write!(f, "Person screening failed: {message}"),
			Self::PiiRejected { person_count } => {
				write!(f, "Document names {person_count} natural person(s) and was not indexed.")
			},
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Storage { message } => write!(f, "Storage error: {message}"),
			Self::Qdrant { message } => write!(f, "Qdrant error: {message}"),
		}
	}
}

impl std::error::Error for ServiceError {}

impl ServiceError {
	/// Retryable errors go back to the job queue; the rest park the job.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Self::Provider { .. }
				| Self::Storage { .. }
				| Self::Qdrant { .. }
				| Self::PiiGate { .. }
		)
	}
}

impl From<sqlx::Error> for ServiceError {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<akte_storage::Error> for ServiceError {
	fn from(err: akte_storage::Error) -> Self {
		match err {
			akte_storage::Error::NotFound(message) => Self::NotFound { message },
			akte_storage::Error::Qdrant(err) => Self::Qdrant { message: err.to_string() },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(rerank::rerank(cfg, query, docs))
	}
}

impl PersonExtractor for DefaultProviders {
	fn extract_persons<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(persons::extract_persons(cfg, text))
	}
}

impl TextExtractor for DefaultProviders {
	fn extract_text<'a>(
		&'a self,
		cfg: &'a ExtractionProviderConfig,
		storage_ref: &'a str,
		mime_type: &'a str,
		mode: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(textract::extract_text(cfg, storage_ref, mime_type, mode))
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		persons: Arc<dyn PersonExtractor>,
		text: Arc<dyn TextExtractor>,
	) -> Self {
		Self { embedding, rerank, persons, text }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			rerank: provider.clone(),
			persons: provider.clone(),
			text: provider,
		}
	}
}

impl AkteService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		Self { cfg, db, qdrant, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, qdrant: QdrantStore, providers: Providers) -> Self {
		Self { cfg, db, qdrant, providers }
	}
}

/// Version tag written to every chunk row, pgvector row, and Qdrant payload.
/// Searches filter on it, so chunks embedded under an older model stop
/// matching after a provider change instead of mixing vector spaces.
pub fn embedding_version(cfg: &Config) -> String {
	format!(
		"{}:{}:{}",
		cfg.providers.embedding.provider_id,
		cfg.providers.embedding.model,
		cfg.storage.qdrant.vector_dim
	)
}
