use std::sync::Arc;

use time::Date;

use tenderlens_domain::DailyEnqueueReport;

use crate::{AnalysisCatalog, Result, TaskQueue};

/// Builds one queued task per active analysis profile for a target date.
pub struct Producer {
	catalog: Arc<dyn AnalysisCatalog>,
	queue: Arc<dyn TaskQueue>,
}
impl Producer {
	pub fn new(catalog: Arc<dyn AnalysisCatalog>, queue: Arc<dyn TaskQueue>) -> Self {
		Self { catalog, queue }
	}

	/// Not idempotent: calling twice for the same date enqueues every
	/// analysis twice. The invoking scheduler owns single invocation.
	pub async fn enqueue_daily(&self, target_date: Date) -> Result<DailyEnqueueReport> {
		let analyses = self.catalog.active_analyses().await?;
		let total_analyses = analyses.len() as u32;
		let mut tasks_created = 0;

		for snapshot in &analyses {
			let task_id = self.queue.enqueue(snapshot, target_date).await?;

			tasks_created += 1;

			tracing::info!(
				analysis_id = %snapshot.analysis_id,
				task_id = %task_id,
				target_date = %target_date,
				"Enqueued analysis task."
			);
		}

		tracing::info!(total_analyses, tasks_created, "Daily enqueue finished.");

		Ok(DailyEnqueueReport { total_analyses, tasks_created })
	}
}
