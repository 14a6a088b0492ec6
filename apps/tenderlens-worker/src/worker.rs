use std::{sync::Arc, time::Duration};

use color_eyre::Result;
use time::OffsetDateTime;

use tenderlens_service::{Funnel, TaskQueue};

const CLAIM_TIMEOUT_SECS: u64 = 5;
const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;
const PURGE_INTERVAL_SECS: i64 = 900;

pub struct WorkerState {
	pub worker_id: String,
	pub queue: Arc<dyn TaskQueue>,
	pub funnel: Funnel,
}

/// The worker loop: claim, run the funnel, report, repeat. A failing task is
/// terminal and never crashes the worker; only queue infrastructure errors
/// trigger backoff.
pub async fn run_worker(state: WorkerState) -> Result<()> {
	let mut processed_count: u64 = 0;
	let mut claim_failures: u32 = 0;
	let mut last_purge = OffsetDateTime::now_utc();

	tracing::info!(worker_id = %state.worker_id, "Worker started.");

	loop {
		let now = OffsetDateTime::now_utc();

		if now - last_purge >= time::Duration::seconds(PURGE_INTERVAL_SECS) {
			match state.queue.purge_expired().await {
				Ok(0) => {},
				Ok(count) => tracing::info!(count, "Purged expired task records."),
				Err(err) => tracing::warn!(error = %err, "Task record purge failed."),
			}

			last_purge = now;
		}

		match process_once(&state, Duration::from_secs(CLAIM_TIMEOUT_SECS)).await {
			Ok(true) => {
				processed_count += 1;
				claim_failures = 0;

				tracing::info!(
					worker_id = %state.worker_id,
					processed_count,
					"Task handled."
				);
			},
			Ok(false) => {
				claim_failures = 0;
			},
			Err(err) => {
				claim_failures = claim_failures.saturating_add(1);

				let backoff = backoff_for_attempt(claim_failures);

				tracing::error!(
					error = %err,
					backoff_ms = backoff.as_millis() as u64,
					"Queue unavailable; backing off."
				);
				tokio::time::sleep(backoff).await;
			},
		}
	}
}

/// Claims and handles at most one task. `Ok(true)` when a task was handled
/// (completed or failed), `Ok(false)` on idle timeout. `Err` is reserved for
/// queue infrastructure failures.
pub async fn process_once(
	state: &WorkerState,
	claim_timeout: Duration,
) -> tenderlens_service::Result<bool> {
	let Some(task) = state.queue.claim(&state.worker_id, claim_timeout).await? else {
		return Ok(false);
	};

	tracing::info!(
		task_id = %task.task_id,
		analysis_id = %task.snapshot.analysis_id,
		"Claimed task."
	);

	match state.funnel.run(&task).await {
		Ok(stats) => {
			state.queue.complete(task.task_id, &stats).await?;
			tracing::info!(task_id = %task.task_id, persisted = stats.persisted, "Task completed.");
		},
		Err(err) => {
			// The task is terminal; the worker moves on without retrying.
			let message = err.to_string();

			tracing::error!(task_id = %task.task_id, error = %message, "Task failed.");
			state.queue.fail(task.task_id, &message).await?;
		},
	}

	Ok(true)
}

fn backoff_for_attempt(attempt: u32) -> Duration {
	let exp = attempt.max(1).saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);

	Duration::from_millis(base.min(MAX_BACKOFF_MS))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_then_caps() {
		assert_eq!(backoff_for_attempt(1), Duration::from_millis(500));
		assert_eq!(backoff_for_attempt(2), Duration::from_millis(1_000));
		assert_eq!(backoff_for_attempt(3), Duration::from_millis(2_000));
		assert_eq!(backoff_for_attempt(7), Duration::from_millis(30_000));
		assert_eq!(backoff_for_attempt(50), Duration::from_millis(30_000));
	}
}
