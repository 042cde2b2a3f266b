mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chunking, Config, EmbeddingProviderConfig, ExtractionProviderConfig, LlmProviderConfig, Pii,
	Postgres, ProviderConfig, Providers, Qdrant, Search, Service, Storage, TemplateSearch, Worker,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.pii_extractor.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.pii_extractor.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.child_chars == 0 {
		return Err(Error::Validation {
			message: "chunking.child_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.parent_chars <= cfg.chunking.child_chars {
		return Err(Error::Validation {
			message: "chunking.parent_chars must be greater than chunking.child_chars.".to_string(),
		});
	}
	if cfg.pii.window_head_chars + cfg.pii.window_tail_chars == 0 {
		return Err(Error::Validation {
			message: "pii window must keep at least one character.".to_string(),
		});
	}
	if cfg.search.rrf_k == 0 {
		return Err(Error::Validation {
			message: "search.rrf_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.top_k == 0 {
		return Err(Error::Validation {
			message: "search.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.rerank_pool < cfg.search.top_k {
		return Err(Error::Validation {
			message: "search.rerank_pool must be at least search.top_k.".to_string(),
		});
	}
	if cfg.search.context_char_budget == 0 {
		return Err(Error::Validation {
			message: "search.context_char_budget must be greater than zero.".to_string(),
		});
	}
	if cfg.template_search.fetch_factor == 0 {
		return Err(Error::Validation {
			message: "template_search.fetch_factor must be greater than zero.".to_string(),
		});
	}
	if !cfg.template_search.firm_boost.is_finite() || cfg.template_search.firm_boost < 1.0 {
		return Err(Error::Validation {
			message: "template_search.firm_boost must be a finite number of at least 1.0."
				.to_string(),
		});
	}
	if cfg.worker.max_attempts <= 0 {
		return Err(Error::Validation {
			message: "worker.max_attempts must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("pii_extractor", &cfg.providers.pii_extractor.api_key),
		("extraction", &cfg.providers.extraction.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}
