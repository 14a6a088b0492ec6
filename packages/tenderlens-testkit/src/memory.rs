use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Mutex,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration as StdDuration,
};

use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use tenderlens_config::EmailProviderConfig;
use tenderlens_domain::{
	AnalysisSnapshot, AnalysisTask, FilterStage, FilteredTender, FunnelStats, QueueStats,
	SearchRecord, TaskStatus, TenderAnalysisResult, TenderCandidate,
};
use tenderlens_service::{
	AnalysisCatalog, BoxFuture, EmailSink, Error, Result, ResultStore, SearchQuery, TaskQueue,
	TenderIndex,
};

fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

struct StoredTask {
	task: AnalysisTask,
	expires_at: OffsetDateTime,
}

#[derive(Default)]
struct QueueInner {
	order: VecDeque<Uuid>,
	tasks: HashMap<Uuid, StoredTask>,
}

/// In-memory task queue with the same observable semantics as the Postgres
/// queue: FIFO, at-most-once claims, terminal failure, explicit requeue.
pub struct MemoryQueue {
	inner: Mutex<QueueInner>,
	lease: Duration,
	retention: Duration,
}
impl Default for MemoryQueue {
	fn default() -> Self {
		Self {
			inner: Mutex::new(QueueInner::default()),
			lease: Duration::seconds(900),
			retention: Duration::days(7),
		}
	}
}
impl MemoryQueue {
	pub fn with_lease(lease: Duration) -> Self {
		Self { lease, ..Self::default() }
	}

	fn try_claim(&self, worker_id: &str) -> Option<AnalysisTask> {
		let mut inner = lock(&self.inner);

		while let Some(task_id) = inner.order.pop_front() {
			let Some(stored) = inner.tasks.get_mut(&task_id) else {
				continue;
			};

			if stored.task.status != TaskStatus::Pending {
				continue;
			}

			let now = OffsetDateTime::now_utc();

			stored.task.status = TaskStatus::Processing;
			stored.task.worker_id = Some(worker_id.to_string());
			stored.task.started_at = Some(now);
			stored.task.lease_until = Some(now + self.lease);

			return Some(stored.task.clone());
		}

		None
	}
}
impl TaskQueue for MemoryQueue {
	fn enqueue<'a>(
		&'a self,
		snapshot: &'a AnalysisSnapshot,
		target_date: Date,
	) -> BoxFuture<'a, Result<Uuid>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let task = AnalysisTask {
				task_id: Uuid::new_v4(),
				snapshot: snapshot.clone(),
				target_date,
				status: TaskStatus::Pending,
				created_at: now,
				started_at: None,
				completed_at: None,
				failed_at: None,
				lease_until: None,
				worker_id: None,
				stats: None,
				error: None,
			};
			let task_id = task.task_id;
			let mut inner = lock(&self.inner);

			inner.tasks.insert(task_id, StoredTask { task, expires_at: now + self.retention });
			inner.order.push_back(task_id);

			Ok(task_id)
		})
	}

	fn claim<'a>(
		&'a self,
		worker_id: &'a str,
		timeout: StdDuration,
	) -> BoxFuture<'a, Result<Option<AnalysisTask>>> {
		Box::pin(async move {
			let deadline = tokio::time::Instant::now() + timeout;

			loop {
				if let Some(task) = self.try_claim(worker_id) {
					return Ok(Some(task));
				}
				if tokio::time::Instant::now() >= deadline {
					return Ok(None);
				}

				tokio::time::sleep(StdDuration::from_millis(5)).await;
			}
		})
	}

	fn complete<'a>(&'a self, task_id: Uuid, stats: &'a FunnelStats) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut inner = lock(&self.inner);
			let stored = inner
				.tasks
				.get_mut(&task_id)
				.filter(|stored| stored.task.status == TaskStatus::Processing)
				.ok_or_else(|| Error::NotFound {
					message: format!("No processing task {task_id}."),
				})?;

			stored.task.status = TaskStatus::Completed;
			stored.task.stats = Some(stats.clone());
			stored.task.completed_at = Some(OffsetDateTime::now_utc());
			stored.task.lease_until = None;

			Ok(())
		})
	}

	fn fail<'a>(&'a self, task_id: Uuid, error: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut inner = lock(&self.inner);
			let stored = inner
				.tasks
				.get_mut(&task_id)
				.filter(|stored| stored.task.status == TaskStatus::Processing)
				.ok_or_else(|| Error::NotFound {
					message: format!("No processing task {task_id}."),
				})?;

			stored.task.status = TaskStatus::Failed;
			stored.task.error = Some(error.to_string());
			stored.task.failed_at = Some(OffsetDateTime::now_utc());
			stored.task.lease_until = None;

			Ok(())
		})
	}

	fn requeue(&self, task_id: Uuid) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let mut inner = lock(&self.inner);
			let Some(stored) = inner.tasks.get_mut(&task_id) else {
				return Err(Error::NotFound { message: format!("No task {task_id}.") });
			};

			if !matches!(stored.task.status, TaskStatus::Failed | TaskStatus::Processing) {
				return Err(Error::Conflict {
					message: format!(
						"Task {task_id} is {}, not requeueable.",
						stored.task.status.as_str()
					),
				});
			}

			stored.task.status = TaskStatus::Pending;
			stored.task.worker_id = None;
			stored.task.error = None;
			stored.task.stats = None;
			stored.task.started_at = None;
			stored.task.completed_at = None;
			stored.task.failed_at = None;
			stored.task.lease_until = None;

			inner.order.push_back(task_id);

			Ok(())
		})
	}

	fn get(&self, task_id: Uuid) -> BoxFuture<'_, Result<Option<AnalysisTask>>> {
		Box::pin(async move {
			Ok(lock(&self.inner).tasks.get(&task_id).map(|stored| stored.task.clone()))
		})
	}

	fn stats(&self) -> BoxFuture<'_, Result<QueueStats>> {
		Box::pin(async move {
			let inner = lock(&self.inner);
			let now = OffsetDateTime::now_utc();
			let mut out = QueueStats::default();

			for stored in inner.tasks.values() {
				match stored.task.status {
					TaskStatus::Pending => out.pending += 1,
					TaskStatus::Processing => {
						out.processing += 1;

						if stored.task.lease_until.map(|lease| lease < now).unwrap_or(false) {
							out.stale += 1;
						}
					},
					TaskStatus::Completed => out.completed += 1,
					TaskStatus::Failed => out.failed += 1,
				}
			}

			out.queue_length = out.pending;

			Ok(out)
		})
	}

	fn completed_since(&self, since: OffsetDateTime) -> BoxFuture<'_, Result<Vec<AnalysisTask>>> {
		Box::pin(async move {
			let inner = lock(&self.inner);
			let mut out: Vec<AnalysisTask> = inner
				.tasks
				.values()
				.filter(|stored| stored.task.status == TaskStatus::Completed)
				.filter(|stored| {
					stored.task.completed_at.map(|at| at > since).unwrap_or(false)
				})
				.map(|stored| stored.task.clone())
				.collect();

			out.sort_by_key(|task| task.completed_at);

			Ok(out)
		})
	}

	fn clear(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move {
			let mut inner = lock(&self.inner);
			let count = inner.tasks.len() as u64;

			inner.tasks.clear();
			inner.order.clear();

			Ok(count)
		})
	}

	fn purge_expired(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move {
			let mut inner = lock(&self.inner);
			let now = OffsetDateTime::now_utc();
			let before = inner.tasks.len();

			inner.tasks.retain(|_, stored| stored.expires_at > now);

			let kept: std::collections::HashSet<Uuid> = inner.tasks.keys().copied().collect();

			inner.order.retain(|task_id| kept.contains(task_id));

			Ok((before - inner.tasks.len()) as u64)
		})
	}
}

#[derive(Clone, Debug)]
pub struct NotificationRecord {
	pub user_id: String,
	pub title: String,
	pub content: String,
	pub kind: String,
}

/// In-memory result store with accessors for assertions, plus an injectable
/// failure for exercising task-fatal store errors at a chosen stage.
#[derive(Default)]
pub struct MemoryStore {
	results: Mutex<Vec<TenderAnalysisResult>>,
	filtered: Mutex<Vec<FilteredTender>>,
	searches: Mutex<Vec<SearchRecord>>,
	notifications: Mutex<Vec<NotificationRecord>>,
	fail_filtered_stage: Mutex<Option<FilterStage>>,
}
impl MemoryStore {
	pub fn fail_filtered_inserts_for(&self, stage: FilterStage) {
		*lock(&self.fail_filtered_stage) = Some(stage);
	}

	pub fn results(&self) -> Vec<TenderAnalysisResult> {
		lock(&self.results).clone()
	}

	pub fn filtered(&self) -> Vec<FilteredTender> {
		lock(&self.filtered).clone()
	}

	pub fn searches(&self) -> Vec<SearchRecord> {
		lock(&self.searches).clone()
	}

	pub fn notifications(&self) -> Vec<NotificationRecord> {
		lock(&self.notifications).clone()
	}
}
impl ResultStore for MemoryStore {
	fn upsert_result<'a>(&'a self, result: &'a TenderAnalysisResult) -> BoxFuture<'a, Result<Uuid>> {
		Box::pin(async move {
			let mut results = lock(&self.results);

			if let Some(existing) = results.iter_mut().find(|existing| {
				existing.analysis_id == result.analysis_id
					&& existing.tender_url == result.tender_url
			}) {
				existing.tender_metadata = result.tender_metadata.clone();
				existing.tender_score = result.tender_score;
				existing.criteria_analysis = result.criteria_analysis.clone();
				existing.user_id = result.user_id.clone();

				return Ok(existing.id);
			}

			results.push(result.clone());

			Ok(result.id)
		})
	}

	fn insert_filtered<'a>(&'a self, records: &'a [FilteredTender]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if let Some(stage) = *lock(&self.fail_filtered_stage)
				&& records.iter().any(|record| record.filter_stage == stage)
			{
				return Err(Error::Storage {
					message: "Injected filtered-insert failure.".to_string(),
				});
			}

			lock(&self.filtered).extend(records.iter().cloned());

			Ok(())
		})
	}

	fn save_search<'a>(&'a self, record: &'a SearchRecord) -> BoxFuture<'a, Result<Uuid>> {
		Box::pin(async move {
			lock(&self.searches).push(record.clone());

			Ok(record.search_id)
		})
	}

	fn results_for_analysis(
		&self,
		analysis_id: Uuid,
	) -> BoxFuture<'_, Result<Vec<TenderAnalysisResult>>> {
		Box::pin(async move {
			let mut out: Vec<TenderAnalysisResult> = lock(&self.results)
				.iter()
				.filter(|result| result.analysis_id == analysis_id)
				.cloned()
				.collect();

			out.sort_by_key(|result| (result.created_at, result.id));

			Ok(out)
		})
	}

	fn results_created_since(
		&self,
		analysis_id: Uuid,
		since: OffsetDateTime,
	) -> BoxFuture<'_, Result<Vec<TenderAnalysisResult>>> {
		Box::pin(async move {
			let mut out: Vec<TenderAnalysisResult> = lock(&self.results)
				.iter()
				.filter(|result| {
					result.analysis_id == analysis_id && result.created_at >= since
				})
				.cloned()
				.collect();

			out.sort_by_key(|result| (result.created_at, result.id));

			Ok(out)
		})
	}

	fn set_order_numbers<'a>(
		&'a self,
		assignments: &'a [(Uuid, i32)],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut results = lock(&self.results);

			for (id, order_number) in assignments {
				if let Some(result) = results.iter_mut().find(|result| result.id == *id) {
					result.order_number = Some(*order_number);
				}
			}

			Ok(())
		})
	}

	fn create_notification<'a>(
		&'a self,
		user_id: &'a str,
		title: &'a str,
		content: &'a str,
		kind: &'a str,
	) -> BoxFuture<'a, Result<Uuid>> {
		Box::pin(async move {
			lock(&self.notifications).push(NotificationRecord {
				user_id: user_id.to_string(),
				title: title.to_string(),
				content: content.to_string(),
				kind: kind.to_string(),
			});

			Ok(Uuid::new_v4())
		})
	}
}

#[derive(Default)]
pub struct MemoryCatalog {
	analyses: Mutex<Vec<AnalysisSnapshot>>,
}
impl MemoryCatalog {
	pub fn push(&self, snapshot: AnalysisSnapshot) {
		lock(&self.analyses).push(snapshot);
	}
}
impl AnalysisCatalog for MemoryCatalog {
	fn active_analyses(&self) -> BoxFuture<'_, Result<Vec<AnalysisSnapshot>>> {
		Box::pin(async move { Ok(lock(&self.analyses).clone()) })
	}
}

/// Canned tender index: seeded candidates for search, recorded upserts for
/// assertions.
#[derive(Default)]
pub struct MemoryIndex {
	canned: Mutex<Vec<TenderCandidate>>,
	upserts: Mutex<HashMap<Uuid, Vec<String>>>,
	fail_upserts: AtomicBool,
}
impl MemoryIndex {
	pub fn seed(&self, candidates: Vec<TenderCandidate>) {
		lock(&self.canned).extend(candidates);
	}

	pub fn upserted(&self) -> HashMap<Uuid, Vec<String>> {
		lock(&self.upserts).clone()
	}

	pub fn set_fail_upserts(&self, fail: bool) {
		self.fail_upserts.store(fail, Ordering::SeqCst);
	}
}
impl TenderIndex for MemoryIndex {
	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<Vec<TenderCandidate>>> {
		Box::pin(async move {
			let out: Vec<TenderCandidate> = lock(&self.canned)
				.iter()
				.filter(|candidate| {
					query.sources.is_empty() || query.sources.contains(&candidate.source)
				})
				.filter(|candidate| candidate.score >= query.score_threshold)
				.take(query.top_k as usize)
				.cloned()
				.collect();

			Ok(out)
		})
	}

	fn upsert_documents<'a>(
		&'a self,
		tender_index_id: Uuid,
		_candidate: &'a TenderCandidate,
		passages: &'a [String],
	) -> BoxFuture<'a, Result<usize>> {
		Box::pin(async move {
			if self.fail_upserts.load(Ordering::SeqCst) {
				return Err(Error::Index { message: "Injected upsert failure.".to_string() });
			}

			lock(&self.upserts).insert(tender_index_id, passages.to_vec());

			Ok(passages.len())
		})
	}
}

#[derive(Clone, Debug)]
pub struct SentEmail {
	pub to: String,
	pub subject: String,
	pub html: String,
}

#[derive(Default)]
pub struct MemoryMailer {
	sent: Mutex<Vec<SentEmail>>,
	fail: AtomicBool,
}
impl MemoryMailer {
	pub fn sent(&self) -> Vec<SentEmail> {
		lock(&self.sent).clone()
	}

	pub fn set_fail(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}
}
impl EmailSink for MemoryMailer {
	fn send_email<'a>(
		&'a self,
		_cfg: &'a EmailProviderConfig,
		to: &'a str,
		subject: &'a str,
		html: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			if self.fail.load(Ordering::SeqCst) {
				return Err(color_eyre::eyre::eyre!("Injected mail failure."));
			}

			lock(&self.sent).push(SentEmail {
				to: to.to_string(),
				subject: subject.to_string(),
				html: html.to_string(),
			});

			Ok(())
		})
	}
}
