use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub queue: Queue,
	pub funnel: Funnel,
	pub notify: Notify,
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
	/// Listing index, owned by the external indexing pipeline. Read-only here.
	pub collection: String,
	/// Per-tender document content, written by the extraction stage.
	pub content_collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub relevance: LlmProviderConfig,
	pub extraction: ServiceProviderConfig,
	pub criteria: ServiceProviderConfig,
	pub email: EmailProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
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

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// An internal HTTP collaborator (extraction service, criteria engine) with
/// no model selection of its own.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmailProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub from_address: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Queue {
	/// Days a finished task record stays readable before the purge pass
	/// removes it.
	pub retention_days: i64,
	pub claim_poll_ms: u64,
	pub lease_seconds: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Funnel {
	pub top_k: u32,
	pub score_threshold: f32,
	#[serde(default = "default_batch_size")]
	pub batch_size: u32,
	#[serde(default = "default_max_concurrent_llm")]
	pub max_concurrent_llm: u32,
	#[serde(default = "default_max_concurrent_extractions")]
	pub max_concurrent_extractions: u32,
	#[serde(default = "default_passage_max_chars")]
	pub passage_max_chars: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Notify {
	pub qualify_threshold: f32,
	pub operator_email: String,
	pub daily_summary_hour: u8,
	pub monitor_poll_secs: u64,
}

fn default_batch_size() -> u32 {
	50
}

fn default_max_concurrent_llm() -> u32 {
	6
}

fn default_max_concurrent_extractions() -> u32 {
	4
}

fn default_passage_max_chars() -> u32 {
	2_000
}
