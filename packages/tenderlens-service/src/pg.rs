use std::time::Duration;

use time::{Date, OffsetDateTime};
use tokio::time::{Instant, sleep};
use uuid::Uuid;

use tenderlens_domain::{
	AnalysisSnapshot, AnalysisTask, FilteredTender, FunnelStats, QueueStats, SearchRecord,
	TenderAnalysisResult,
};
use tenderlens_storage::{analyses, db::Db, notifications, queue, results};

use crate::{AnalysisCatalog, BoxFuture, Result, ResultStore, TaskQueue};

/// Postgres-backed task queue. The single-row `FOR UPDATE SKIP LOCKED` claim
/// in the storage layer is what makes competing consumers safe; this adapter
/// adds the blocking-poll surface on top.
pub struct PgQueue {
	db: Db,
	retention_days: i64,
	lease_seconds: i64,
	claim_poll: Duration,
}
impl PgQueue {
	pub fn new(db: Db, cfg: &tenderlens_config::Queue) -> Self {
		Self {
			db,
			retention_days: cfg.retention_days,
			lease_seconds: cfg.lease_seconds,
			claim_poll: Duration::from_millis(cfg.claim_poll_ms.max(1)),
		}
	}
}
impl TaskQueue for PgQueue {
	fn enqueue<'a>(
		&'a self,
		snapshot: &'a AnalysisSnapshot,
		target_date: Date,
	) -> BoxFuture<'a, Result<Uuid>> {
		Box::pin(async move {
			Ok(queue::enqueue(&self.db, snapshot, target_date, self.retention_days).await?)
		})
	}

	fn claim<'a>(
		&'a self,
		worker_id: &'a str,
		timeout: Duration,
	) -> BoxFuture<'a, Result<Option<AnalysisTask>>> {
		Box::pin(async move {
			let deadline = Instant::now() + timeout;

			loop {
				if let Some(row) =
					queue::claim_one(&self.db, worker_id, self.lease_seconds).await?
				{
					return Ok(Some(row.into_task()?));
				}

				let now = Instant::now();

				if now >= deadline {
					return Ok(None);
				}

				sleep(self.claim_poll.min(deadline - now)).await;
			}
		})
	}

	fn complete<'a>(&'a self, task_id: Uuid, stats: &'a FunnelStats) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(queue::complete(&self.db, task_id, stats).await?) })
	}

	fn fail<'a>(&'a self, task_id: Uuid, error: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(queue::fail(&self.db, task_id, error).await?) })
	}

	fn requeue(&self, task_id: Uuid) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { Ok(queue::requeue(&self.db, task_id).await?) })
	}

	fn get(&self, task_id: Uuid) -> BoxFuture<'_, Result<Option<AnalysisTask>>> {
		Box::pin(async move {
			match queue::get(&self.db, task_id).await? {
				Some(row) => Ok(Some(row.into_task()?)),
				None => Ok(None),
			}
		})
	}

	fn stats(&self) -> BoxFuture<'_, Result<QueueStats>> {
		Box::pin(async move { Ok(queue::stats(&self.db).await?) })
	}

	fn completed_since(&self, since: OffsetDateTime) -> BoxFuture<'_, Result<Vec<AnalysisTask>>> {
		Box::pin(async move {
			queue::completed_since(&self.db, since)
				.await?
				.into_iter()
				.map(|row| row.into_task().map_err(Into::into))
				.collect()
		})
	}

	fn clear(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move { Ok(queue::clear(&self.db).await?) })
	}

	fn purge_expired(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move {
			Ok(queue::purge_expired(&self.db, OffsetDateTime::now_utc()).await?)
		})
	}
}

pub struct PgStore {
	db: Db,
}
impl PgStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}
}
impl ResultStore for PgStore {
	fn upsert_result<'a>(&'a self, result: &'a TenderAnalysisResult) -> BoxFuture<'a, Result<Uuid>> {
		Box::pin(async move { Ok(results::upsert_result(&self.db, result).await?) })
	}

	fn insert_filtered<'a>(&'a self, records: &'a [FilteredTender]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(results::insert_filtered(&self.db, records).await?) })
	}

	fn save_search<'a>(&'a self, record: &'a SearchRecord) -> BoxFuture<'a, Result<Uuid>> {
		Box::pin(async move { Ok(results::save_search(&self.db, record).await?) })
	}

	fn results_for_analysis(
		&self,
		analysis_id: Uuid,
	) -> BoxFuture<'_, Result<Vec<TenderAnalysisResult>>> {
		Box::pin(async move {
			results::results_for_analysis(&self.db, analysis_id)
				.await?
				.into_iter()
				.map(|row| row.into_result().map_err(Into::into))
				.collect()
		})
	}

	fn results_created_since(
		&self,
		analysis_id: Uuid,
		since: OffsetDateTime,
	) -> BoxFuture<'_, Result<Vec<TenderAnalysisResult>>> {
		Box::pin(async move {
			results::results_created_since(&self.db, analysis_id, since)
				.await?
				.into_iter()
				.map(|row| row.into_result().map_err(Into::into))
				.collect()
		})
	}

	fn set_order_numbers<'a>(
		&'a self,
		assignments: &'a [(Uuid, i32)],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(results::set_order_numbers(&self.db, assignments).await?) })
	}

	fn create_notification<'a>(
		&'a self,
		user_id: &'a str,
		title: &'a str,
		content: &'a str,
		kind: &'a str,
	) -> BoxFuture<'a, Result<Uuid>> {
		Box::pin(async move {
			Ok(notifications::insert_notification(&self.db, user_id, title, content, kind).await?)
		})
	}
}

pub struct PgCatalog {
	db: Db,
}
impl PgCatalog {
	pub fn new(db: Db) -> Self {
		Self { db }
	}
}
impl AnalysisCatalog for PgCatalog {
	fn active_analyses(&self) -> BoxFuture<'_, Result<Vec<AnalysisSnapshot>>> {
		Box::pin(async move { Ok(analyses::active_analyses(&self.db).await?) })
	}
}
