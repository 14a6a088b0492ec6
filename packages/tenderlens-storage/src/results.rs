use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use tenderlens_domain::{FilteredTender, SearchRecord, TenderAnalysisResult};

use crate::{Result, db::Db, models::{FilteredResultRow, TenderResultRow}};

const RESULT_COLUMNS: &str = "\
id, analysis_id, user_id, tender_url, tender_metadata, tender_score, criteria, criteria_archive, \
status, order_number, created_at, opened_at";

/// Inserts a new result, or refreshes an existing one for the same
/// (analysis, tender) pair. On refresh, the previous criteria list moves into
/// the archive as one run; order number, creation time, and opened state
/// survive untouched.
pub async fn upsert_result(db: &Db, result: &TenderAnalysisResult) -> Result<Uuid> {
	let criteria_json = serde_json::to_value(&result.criteria_analysis)?;
	let mut tx = db.pool.begin().await?;
	let existing: Option<(Uuid,)> = sqlx::query_as(
		"SELECT id FROM tender_results WHERE analysis_id = $1 AND tender_url = $2 FOR UPDATE",
	)
	.bind(result.analysis_id)
	.bind(&result.tender_url)
	.fetch_optional(&mut *tx)
	.await?;
	let id = match existing {
		Some((id,)) => {
			sqlx::query(
				"\
UPDATE tender_results
SET criteria_archive = criteria_archive || jsonb_build_array(criteria),
	criteria = $1,
	tender_score = $2,
	tender_metadata = $3,
	user_id = $4
WHERE id = $5",
			)
			.bind(&criteria_json)
			.bind(result.tender_score)
			.bind(&result.tender_metadata)
			.bind(&result.user_id)
			.bind(id)
			.execute(&mut *tx)
			.await?;

			id
		},
		None => {
			sqlx::query(
				"\
INSERT INTO tender_results (id, analysis_id, user_id, tender_url, tender_metadata, tender_score, criteria, status, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
			)
			.bind(result.id)
			.bind(result.analysis_id)
			.bind(&result.user_id)
			.bind(&result.tender_url)
			.bind(&result.tender_metadata)
			.bind(result.tender_score)
			.bind(&criteria_json)
			.bind(result.status.as_str())
			.bind(result.created_at)
			.execute(&mut *tx)
			.await?;

			result.id
		},
	};

	tx.commit().await?;

	Ok(id)
}

pub async fn results_for_analysis(db: &Db, analysis_id: Uuid) -> Result<Vec<TenderResultRow>> {
	let rows = sqlx::query_as(&format!(
		"\
SELECT {RESULT_COLUMNS}
FROM tender_results
WHERE analysis_id = $1
ORDER BY created_at ASC, id ASC",
	))
	.bind(analysis_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn results_created_since(
	db: &Db,
	analysis_id: Uuid,
	since: OffsetDateTime,
) -> Result<Vec<TenderResultRow>> {
	let rows = sqlx::query_as(&format!(
		"\
SELECT {RESULT_COLUMNS}
FROM tender_results
WHERE analysis_id = $1 AND created_at >= $2
ORDER BY created_at ASC, id ASC",
	))
	.bind(analysis_id)
	.bind(since)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn set_order_numbers(db: &Db, assignments: &[(Uuid, i32)]) -> Result<()> {
	if assignments.is_empty() {
		return Ok(());
	}

	let mut tx = db.pool.begin().await?;

	for (id, order_number) in assignments {
		sqlx::query("UPDATE tender_results SET order_number = $1 WHERE id = $2")
			.bind(order_number)
			.bind(id)
			.execute(&mut *tx)
			.await?;
	}

	tx.commit().await?;

	Ok(())
}

pub async fn insert_filtered(db: &Db, records: &[FilteredTender]) -> Result<()> {
	if records.is_empty() {
		return Ok(());
	}

	let mut builder = QueryBuilder::new(
		"\
INSERT INTO filtered_results (id, tender_id, analysis_id, filter_stage, filter_reason, original_match, created_at) ",
	);

	builder.push_values(records, |mut b, record| {
		b.push_bind(Uuid::new_v4())
			.push_bind(&record.tender_id)
			.push_bind(record.analysis_id)
			.push_bind(record.filter_stage.as_str())
			.push_bind(&record.filter_reason)
			.push_bind(&record.original_match)
			.push_bind(record.filter_timestamp);
	});
	builder.build().execute(&db.pool).await?;

	Ok(())
}

pub async fn filtered_for_analysis(db: &Db, analysis_id: Uuid) -> Result<Vec<FilteredResultRow>> {
	let rows = sqlx::query_as(
		"\
SELECT id, tender_id, analysis_id, filter_stage, filter_reason, original_match, created_at
FROM filtered_results
WHERE analysis_id = $1
ORDER BY created_at ASC",
	)
	.bind(analysis_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn save_search(db: &Db, record: &SearchRecord) -> Result<Uuid> {
	let candidates_json = serde_json::to_value(&record.candidates)?;

	sqlx::query(
		"\
INSERT INTO search_records (search_id, analysis_id, target_date, phrase, candidates, created_at)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(record.search_id)
	.bind(record.analysis_id)
	.bind(record.target_date)
	.bind(&record.phrase)
	.bind(&candidates_json)
	.bind(record.created_at)
	.execute(&db.pool)
	.await?;

	Ok(record.search_id)
}
