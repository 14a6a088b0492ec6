use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use tenderlens_domain::{AnalysisSnapshot, FunnelStats, QueueStats};

use crate::{Error, Result, db::Db, models::TaskRow};

const TASK_COLUMNS: &str = "\
task_id, analysis_id, snapshot, target_date, status, worker_id, error, stats, created_at, \
started_at, completed_at, failed_at, lease_until, expires_at";

const MAX_ERROR_CHARS: usize = 1_024;

pub async fn enqueue(
	db: &Db,
	snapshot: &AnalysisSnapshot,
	target_date: time::Date,
	retention_days: i64,
) -> Result<Uuid> {
	let task_id = Uuid::new_v4();
	let snapshot_json = serde_json::to_value(snapshot)?;
	let now = OffsetDateTime::now_utc();
	let expires_at = now + Duration::days(retention_days.max(1));

	sqlx::query(
		"\
INSERT INTO analysis_tasks (task_id, analysis_id, snapshot, target_date, status, created_at, expires_at)
VALUES ($1, $2, $3, $4, 'PENDING', $5, $6)",
	)
	.bind(task_id)
	.bind(snapshot.analysis_id)
	.bind(&snapshot_json)
	.bind(target_date)
	.bind(now)
	.bind(expires_at)
	.execute(&db.pool)
	.await?;

	Ok(task_id)
}

/// Claims at most one pending task. The `FOR UPDATE SKIP LOCKED` select keeps
/// concurrent claimers off the same row, so a task is handed to exactly one
/// caller.
pub async fn claim_one(db: &Db, worker_id: &str, lease_seconds: i64) -> Result<Option<TaskRow>> {
	let now = OffsetDateTime::now_utc();
	let mut tx = db.pool.begin().await?;
	let row: Option<TaskRow> = sqlx::query_as(&format!(
		"\
SELECT {TASK_COLUMNS}
FROM analysis_tasks
WHERE status = 'PENDING'
ORDER BY created_at ASC
LIMIT 1
FOR UPDATE SKIP LOCKED",
	))
	.fetch_optional(&mut *tx)
	.await?;
	let row = if let Some(mut row) = row {
		let lease_until = now + Duration::seconds(lease_seconds.max(1));

		sqlx::query(
			"\
UPDATE analysis_tasks
SET status = 'PROCESSING', worker_id = $1, started_at = $2, lease_until = $3
WHERE task_id = $4",
		)
		.bind(worker_id)
		.bind(now)
		.bind(lease_until)
		.bind(row.task_id)
		.execute(&mut *tx)
		.await?;

		row.status = "PROCESSING".to_string();
		row.worker_id = Some(worker_id.to_string());
		row.started_at = Some(now);
		row.lease_until = Some(lease_until);

		Some(row)
	} else {
		None
	};

	tx.commit().await?;

	Ok(row)
}

pub async fn complete(db: &Db, task_id: Uuid, stats: &FunnelStats) -> Result<()> {
	let now = OffsetDateTime::now_utc();
	let stats_json = serde_json::to_value(stats)?;
	let updated = sqlx::query(
		"\
UPDATE analysis_tasks
SET status = 'COMPLETED', stats = $1, completed_at = $2, lease_until = NULL
WHERE task_id = $3 AND status = 'PROCESSING'",
	)
	.bind(&stats_json)
	.bind(now)
	.bind(task_id)
	.execute(&db.pool)
	.await?;

	if updated.rows_affected() == 0 {
		return Err(Error::NotFound(format!("No processing task {task_id}.")));
	}

	Ok(())
}

pub async fn fail(db: &Db, task_id: Uuid, error: &str) -> Result<()> {
	let now = OffsetDateTime::now_utc();
	let error = sanitize_error(error);
	let updated = sqlx::query(
		"\
UPDATE analysis_tasks
SET status = 'FAILED', error = $1, failed_at = $2, lease_until = NULL
WHERE task_id = $3 AND status = 'PROCESSING'",
	)
	.bind(&error)
	.bind(now)
	.bind(task_id)
	.execute(&db.pool)
	.await?;

	if updated.rows_affected() == 0 {
		return Err(Error::NotFound(format!("No processing task {task_id}.")));
	}

	Ok(())
}

/// Returns a failed (or stuck processing) task to the pending queue. This is
/// the only path back: nothing requeues automatically.
pub async fn requeue(db: &Db, task_id: Uuid) -> Result<()> {
	let updated = sqlx::query(
		"\
UPDATE analysis_tasks
SET status = 'PENDING', worker_id = NULL, error = NULL, stats = NULL,
	started_at = NULL, completed_at = NULL, failed_at = NULL, lease_until = NULL
WHERE task_id = $1 AND status IN ('FAILED', 'PROCESSING')",
	)
	.bind(task_id)
	.execute(&db.pool)
	.await?;

	if updated.rows_affected() > 0 {
		return Ok(());
	}

	let status: Option<(String,)> =
		sqlx::query_as("SELECT status FROM analysis_tasks WHERE task_id = $1")
			.bind(task_id)
			.fetch_optional(&db.pool)
			.await?;

	match status {
		None => Err(Error::NotFound(format!("No task {task_id}."))),
		Some((status,)) =>
			Err(Error::Conflict(format!("Task {task_id} is {status}, not requeueable."))),
	}
}

pub async fn get(db: &Db, task_id: Uuid) -> Result<Option<TaskRow>> {
	let row = sqlx::query_as(&format!(
		"SELECT {TASK_COLUMNS} FROM analysis_tasks WHERE task_id = $1",
	))
	.bind(task_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn stats(db: &Db) -> Result<QueueStats> {
	let now = OffsetDateTime::now_utc();
	let rows: Vec<(String, i64)> =
		sqlx::query_as("SELECT status, COUNT(*) FROM analysis_tasks GROUP BY status")
			.fetch_all(&db.pool)
			.await?;
	let (stale,): (i64,) = sqlx::query_as(
		"SELECT COUNT(*) FROM analysis_tasks WHERE status = 'PROCESSING' AND lease_until < $1",
	)
	.bind(now)
	.fetch_one(&db.pool)
	.await?;
	let mut out = QueueStats { stale: stale.max(0) as u64, ..QueueStats::default() };

	for (status, count) in rows {
		let count = count.max(0) as u64;

		match status.as_str() {
			"PENDING" => out.pending = count,
			"PROCESSING" => out.processing = count,
			"COMPLETED" => out.completed = count,
			"FAILED" => out.failed = count,
			_ => {},
		}
	}

	out.queue_length = out.pending;

	Ok(out)
}

pub async fn completed_since(db: &Db, since: OffsetDateTime) -> Result<Vec<TaskRow>> {
	let rows = sqlx::query_as(&format!(
		"\
SELECT {TASK_COLUMNS}
FROM analysis_tasks
WHERE status = 'COMPLETED' AND completed_at > $1
ORDER BY completed_at ASC",
	))
	.bind(since)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn clear(db: &Db) -> Result<u64> {
	let deleted = sqlx::query("DELETE FROM analysis_tasks").execute(&db.pool).await?;

	Ok(deleted.rows_affected())
}

pub async fn purge_expired(db: &Db, now: OffsetDateTime) -> Result<u64> {
	let deleted = sqlx::query("DELETE FROM analysis_tasks WHERE expires_at <= $1")
		.bind(now)
		.execute(&db.pool)
		.await?;

	Ok(deleted.rows_affected())
}

/// Task errors end up in operator-visible listings; strip anything that looks
/// like a credential and cap the length.
fn sanitize_error(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		for key in ["api_key", "apikey", "password", "secret", "token"] {
			if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = raw.split(sep).next().unwrap_or(raw);

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		parts.push(word);
	}

	let mut out = parts.join(" ");

	if out.chars().count() > MAX_ERROR_CHARS {
		out = out.chars().take(MAX_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}
