use time::OffsetDateTime;
use uuid::Uuid;

use tenderlens_domain::AnalysisSnapshot;

use crate::{Result, db::Db, models::AnalysisRow};

pub async fn active_analyses(db: &Db) -> Result<Vec<AnalysisSnapshot>> {
	let rows: Vec<AnalysisRow> = sqlx::query_as(
		"\
SELECT analysis_id, config, active, created_at, updated_at
FROM analyses
WHERE active = TRUE
ORDER BY created_at ASC",
	)
	.fetch_all(&db.pool)
	.await?;

	rows.into_iter().map(AnalysisRow::into_snapshot).collect()
}

pub async fn upsert_analysis(db: &Db, snapshot: &AnalysisSnapshot, active: bool) -> Result<Uuid> {
	let config = serde_json::to_value(snapshot)?;
	let now = OffsetDateTime::now_utc();

	sqlx::query(
		"\
INSERT INTO analyses (analysis_id, config, active, created_at, updated_at)
VALUES ($1, $2, $3, $4, $4)
ON CONFLICT (analysis_id) DO UPDATE
SET config = EXCLUDED.config, active = EXCLUDED.active, updated_at = EXCLUDED.updated_at",
	)
	.bind(snapshot.analysis_id)
	.bind(&config)
	.bind(active)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(snapshot.analysis_id)
}
