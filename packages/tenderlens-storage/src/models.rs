use serde_json::Value;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use tenderlens_domain::{
	AnalysisSnapshot, AnalysisTask, FilterStage, FilteredTender, FunnelStats, ResultStatus,
	TaskStatus, TenderAnalysisResult, TenderCandidate,
};

use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
pub struct TaskRow {
	pub task_id: Uuid,
	pub analysis_id: Uuid,
	pub snapshot: Value,
	pub target_date: Date,
	pub status: String,
	pub worker_id: Option<String>,
	pub error: Option<String>,
	pub stats: Option<Value>,
	pub created_at: OffsetDateTime,
	pub started_at: Option<OffsetDateTime>,
	pub completed_at: Option<OffsetDateTime>,
	pub failed_at: Option<OffsetDateTime>,
	pub lease_until: Option<OffsetDateTime>,
	pub expires_at: OffsetDateTime,
}
impl TaskRow {
	pub fn into_task(self) -> Result<AnalysisTask> {
		let status = TaskStatus::parse(&self.status)
			.ok_or_else(|| Error::InvalidArgument(format!("Unknown task status {:?}.", self.status)))?;
		let snapshot: AnalysisSnapshot = serde_json::from_value(self.snapshot)?;
		let stats: Option<FunnelStats> =
			self.stats.map(serde_json::from_value).transpose()?;

		Ok(AnalysisTask {
			task_id: self.task_id,
			snapshot,
			target_date: self.target_date,
			status,
			created_at: self.created_at,
			started_at: self.started_at,
			completed_at: self.completed_at,
			failed_at: self.failed_at,
			lease_until: self.lease_until,
			worker_id: self.worker_id,
			stats,
			error: self.error,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct AnalysisRow {
	pub analysis_id: Uuid,
	pub config: Value,
	pub active: bool,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl AnalysisRow {
	pub fn into_snapshot(self) -> Result<AnalysisSnapshot> {
		let mut snapshot: AnalysisSnapshot = serde_json::from_value(self.config)?;

		// The row key is authoritative over whatever the stored profile says.
		snapshot.analysis_id = self.analysis_id;

		Ok(snapshot)
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct TenderResultRow {
	pub id: Uuid,
	pub analysis_id: Uuid,
	pub user_id: Option<String>,
	pub tender_url: String,
	pub tender_metadata: Value,
	pub tender_score: Option<f32>,
	pub criteria: Value,
	pub criteria_archive: Value,
	pub status: String,
	pub order_number: Option<i32>,
	pub created_at: OffsetDateTime,
	pub opened_at: Option<OffsetDateTime>,
}
impl TenderResultRow {
	pub fn into_result(self) -> Result<TenderAnalysisResult> {
		let status = ResultStatus::parse(&self.status).ok_or_else(|| {
			Error::InvalidArgument(format!("Unknown result status {:?}.", self.status))
		})?;

		Ok(TenderAnalysisResult {
			id: self.id,
			analysis_id: self.analysis_id,
			user_id: self.user_id,
			tender_url: self.tender_url,
			tender_metadata: self.tender_metadata,
			tender_score: self.tender_score,
			criteria_analysis: serde_json::from_value(self.criteria)?,
			status,
			order_number: self.order_number,
			created_at: self.created_at,
			opened_at: self.opened_at,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct FilteredResultRow {
	pub id: Uuid,
	pub tender_id: String,
	pub analysis_id: Uuid,
	pub filter_stage: String,
	pub filter_reason: String,
	pub original_match: Value,
	pub created_at: OffsetDateTime,
}
impl FilteredResultRow {
	pub fn into_record(self) -> Result<FilteredTender> {
		let filter_stage = FilterStage::parse(&self.filter_stage).ok_or_else(|| {
			Error::InvalidArgument(format!("Unknown filter stage {:?}.", self.filter_stage))
		})?;

		Ok(FilteredTender {
			tender_id: self.tender_id,
			analysis_id: self.analysis_id,
			filter_stage,
			filter_reason: self.filter_reason,
			filter_timestamp: self.created_at,
			original_match: self.original_match,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct SearchRecordRow {
	pub search_id: Uuid,
	pub analysis_id: Uuid,
	pub target_date: Date,
	pub phrase: String,
	pub candidates: Value,
	pub created_at: OffsetDateTime,
}
impl SearchRecordRow {
	pub fn candidates(&self) -> Result<Vec<TenderCandidate>> {
		Ok(serde_json::from_value(self.candidates.clone())?)
	}
}
