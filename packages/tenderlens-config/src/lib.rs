mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmailProviderConfig, EmbeddingProviderConfig, Funnel, LlmProviderConfig, Notify,
	Postgres, Providers, Qdrant, Queue, Service, ServiceProviderConfig, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

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
	if cfg.queue.retention_days <= 0 {
		return Err(Error::Validation {
			message: "queue.retention_days must be greater than zero.".to_string(),
		});
	}
	if cfg.queue.claim_poll_ms == 0 {
		return Err(Error::Validation {
			message: "queue.claim_poll_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.queue.lease_seconds <= 0 {
		return Err(Error::Validation {
			message: "queue.lease_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.funnel.top_k == 0 {
		return Err(Error::Validation {
			message: "funnel.top_k must be greater than zero.".to_string(),
		});
	}
	if !cfg.funnel.score_threshold.is_finite()
		|| !(0.0..=1.0).contains(&cfg.funnel.score_threshold)
	{
		return Err(Error::Validation {
			message: "funnel.score_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.funnel.batch_size == 0 {
		return Err(Error::Validation {
			message: "funnel.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.funnel.max_concurrent_llm == 0 {
		return Err(Error::Validation {
			message: "funnel.max_concurrent_llm must be greater than zero.".to_string(),
		});
	}
	if cfg.funnel.max_concurrent_extractions == 0 {
		return Err(Error::Validation {
			message: "funnel.max_concurrent_extractions must be greater than zero.".to_string(),
		});
	}
	if cfg.funnel.passage_max_chars == 0 {
		return Err(Error::Validation {
			message: "funnel.passage_max_chars must be greater than zero.".to_string(),
		});
	}
	if !cfg.notify.qualify_threshold.is_finite()
		|| !(0.0..=1.0).contains(&cfg.notify.qualify_threshold)
	{
		return Err(Error::Validation {
			message: "notify.qualify_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.notify.daily_summary_hour > 23 {
		return Err(Error::Validation {
			message: "notify.daily_summary_hour must be an hour of day (0-23).".to_string(),
		});
	}
	if cfg.notify.monitor_poll_secs == 0 {
		return Err(Error::Validation {
			message: "notify.monitor_poll_secs must be greater than zero.".to_string(),
		});
	}
	if !cfg.notify.operator_email.contains('@') {
		return Err(Error::Validation {
			message: "notify.operator_email must be an e-mail address.".to_string(),
		});
	}
	if !cfg.providers.email.from_address.contains('@') {
		return Err(Error::Validation {
			message: "providers.email.from_address must be an e-mail address.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("relevance", &cfg.providers.relevance.api_key),
		("extraction", &cfg.providers.extraction.api_key),
		("criteria", &cfg.providers.criteria.api_key),
		("email", &cfg.providers.email.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for api_base in [
		&mut cfg.providers.embedding.api_base,
		&mut cfg.providers.relevance.api_base,
		&mut cfg.providers.extraction.api_base,
		&mut cfg.providers.criteria.api_base,
		&mut cfg.providers.email.api_base,
	] {
		while api_base.ends_with('/') {
			api_base.pop();
		}
	}
}
