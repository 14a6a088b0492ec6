pub mod funnel;
pub mod index;
pub mod monitor;
pub mod ordering;
pub mod pg;
pub mod producer;

mod error;

pub use error::{Error, Result};
pub use funnel::Funnel;
pub use index::QdrantTenderIndex;
pub use monitor::{CompletionMonitor, TickReport};
pub use pg::{PgCatalog, PgQueue, PgStore};
pub use producer::Producer;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use time::{Date, OffsetDateTime};
use uuid::Uuid;

use tenderlens_config::{
	EmailProviderConfig, EmbeddingProviderConfig, LlmProviderConfig, ServiceProviderConfig,
};
use tenderlens_domain::{
	AnalysisSnapshot, AnalysisTask, BatchVerdict, Criterion, CriteriaAnalysisResult,
	DescriptionVerdict, ExtractionReport, FilteredTender, FunnelStats, QueueStats, SearchRecord,
	TenderAnalysisResult, TenderCandidate,
};
use tenderlens_providers::{criteria, email, embedding, extraction, relevance};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// External collaborators the funnel calls out to. Production code wires the
// HTTP-backed defaults below; tests substitute fakes.

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

pub trait RelevanceProvider
where
	Self: Send + Sync,
{
	fn classify_batch<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		company_description: &'a str,
		candidates: &'a [TenderCandidate],
	) -> BoxFuture<'a, color_eyre::Result<BatchVerdict>>;

	fn filter_description<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		company_description: &'a str,
		description: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<DescriptionVerdict>>;
}

pub trait ExtractionProvider
where
	Self: Send + Sync,
{
	fn extract_files<'a>(
		&'a self,
		cfg: &'a ServiceProviderConfig,
		candidate: &'a TenderCandidate,
	) -> BoxFuture<'a, color_eyre::Result<ExtractionReport>>;
}

pub trait CriteriaProvider
where
	Self: Send + Sync,
{
	fn analyze<'a>(
		&'a self,
		cfg: &'a ServiceProviderConfig,
		tender_index_id: Uuid,
		criteria: &'a [Criterion],
	) -> BoxFuture<'a, color_eyre::Result<Vec<CriteriaAnalysisResult>>>;
}

pub trait EmailSink
where
	Self: Send + Sync,
{
	fn send_email<'a>(
		&'a self,
		cfg: &'a EmailProviderConfig,
		to: &'a str,
		subject: &'a str,
		html: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>>;
}

/// The durable competing-consumers queue. `claim` hands any task to exactly
/// one caller across all concurrent claimers.
pub trait TaskQueue
where
	Self: Send + Sync,
{
	fn enqueue<'a>(
		&'a self,
		snapshot: &'a AnalysisSnapshot,
		target_date: Date,
	) -> BoxFuture<'a, Result<Uuid>>;

	/// Blocks up to `timeout` for a pending task. `None` on timeout is the
	/// worker's idle state, not an error.
	fn claim<'a>(
		&'a self,
		worker_id: &'a str,
		timeout: Duration,
	) -> BoxFuture<'a, Result<Option<AnalysisTask>>>;

	fn complete<'a>(&'a self, task_id: Uuid, stats: &'a FunnelStats) -> BoxFuture<'a, Result<()>>;

	fn fail<'a>(&'a self, task_id: Uuid, error: &'a str) -> BoxFuture<'a, Result<()>>;

	/// Explicit operator action; nothing requeues automatically.
	fn requeue(&self, task_id: Uuid) -> BoxFuture<'_, Result<()>>;

	fn get(&self, task_id: Uuid) -> BoxFuture<'_, Result<Option<AnalysisTask>>>;

	fn stats(&self) -> BoxFuture<'_, Result<QueueStats>>;

	fn completed_since(&self, since: OffsetDateTime) -> BoxFuture<'_, Result<Vec<AnalysisTask>>>;

	fn clear(&self) -> BoxFuture<'_, Result<u64>>;

	fn purge_expired(&self) -> BoxFuture<'_, Result<u64>>;
}

pub trait ResultStore
where
	Self: Send + Sync,
{
	fn upsert_result<'a>(&'a self, result: &'a TenderAnalysisResult) -> BoxFuture<'a, Result<Uuid>>;

	fn insert_filtered<'a>(&'a self, records: &'a [FilteredTender]) -> BoxFuture<'a, Result<()>>;

	fn save_search<'a>(&'a self, record: &'a SearchRecord) -> BoxFuture<'a, Result<Uuid>>;

	fn results_for_analysis(
		&self,
		analysis_id: Uuid,
	) -> BoxFuture<'_, Result<Vec<TenderAnalysisResult>>>;

	fn results_created_since(
		&self,
		analysis_id: Uuid,
		since: OffsetDateTime,
	) -> BoxFuture<'_, Result<Vec<TenderAnalysisResult>>>;

	fn set_order_numbers<'a>(
		&'a self,
		assignments: &'a [(Uuid, i32)],
	) -> BoxFuture<'a, Result<()>>;

	fn create_notification<'a>(
		&'a self,
		user_id: &'a str,
		title: &'a str,
		content: &'a str,
		kind: &'a str,
	) -> BoxFuture<'a, Result<Uuid>>;
}

/// Read-only view of the externally-owned analysis profiles.
pub trait AnalysisCatalog
where
	Self: Send + Sync,
{
	fn active_analyses(&self) -> BoxFuture<'_, Result<Vec<AnalysisSnapshot>>>;
}

#[derive(Clone, Debug)]
pub struct SearchQuery {
	pub phrase: String,
	pub sources: Vec<String>,
	pub target_date: Date,
	pub top_k: u32,
	pub score_threshold: f32,
}

/// The pre-built tender index: hybrid search over listings plus per-tender
/// document upserts for the criteria engine to retrieve against.
pub trait TenderIndex
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<Vec<TenderCandidate>>>;

	fn upsert_documents<'a>(
		&'a self,
		tender_index_id: Uuid,
		candidate: &'a TenderCandidate,
		passages: &'a [String],
	) -> BoxFuture<'a, Result<usize>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub relevance: Arc<dyn RelevanceProvider>,
	pub extraction: Arc<dyn ExtractionProvider>,
	pub criteria: Arc<dyn CriteriaProvider>,
	pub email: Arc<dyn EmailSink>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		relevance: Arc<dyn RelevanceProvider>,
		extraction: Arc<dyn ExtractionProvider>,
		criteria: Arc<dyn CriteriaProvider>,
		email: Arc<dyn EmailSink>,
	) -> Self {
		Self { embedding, relevance, extraction, criteria, email }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			relevance: provider.clone(),
			extraction: provider.clone(),
			criteria: provider.clone(),
			email: provider,
		}
	}
}

pub struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RelevanceProvider for DefaultProviders {
	fn classify_batch<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		company_description: &'a str,
		candidates: &'a [TenderCandidate],
	) -> BoxFuture<'a, color_eyre::Result<BatchVerdict>> {
		Box::pin(relevance::classify_batch(cfg, company_description, candidates))
	}

	fn filter_description<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		company_description: &'a str,
		description: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<DescriptionVerdict>> {
		Box::pin(relevance::filter_description(cfg, company_description, description))
	}
}

impl ExtractionProvider for DefaultProviders {
	fn extract_files<'a>(
		&'a self,
		cfg: &'a ServiceProviderConfig,
		candidate: &'a TenderCandidate,
	) -> BoxFuture<'a, color_eyre::Result<ExtractionReport>> {
		Box::pin(extraction::extract_files(cfg, candidate))
	}
}

impl CriteriaProvider for DefaultProviders {
	fn analyze<'a>(
		&'a self,
		cfg: &'a ServiceProviderConfig,
		tender_index_id: Uuid,
		criteria: &'a [Criterion],
	) -> BoxFuture<'a, color_eyre::Result<Vec<CriteriaAnalysisResult>>> {
		Box::pin(criteria::analyze(cfg, tender_index_id, criteria))
	}
}

impl EmailSink for DefaultProviders {
	fn send_email<'a>(
		&'a self,
		cfg: &'a EmailProviderConfig,
		to: &'a str,
		subject: &'a str,
		html: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(email::send(cfg, to, subject, html))
	}
}
