use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::time_serde;

/// One weighted requirement inside an analysis profile.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Criterion {
	pub name: String,
	#[serde(default = "default_weight")]
	pub weight: i32,
	#[serde(default)]
	pub is_disqualifying: bool,
	#[serde(default)]
	pub exclude_from_score: bool,
}

fn default_weight() -> i32 {
	crate::criteria_gate::DEFAULT_CRITERION_WEIGHT
}

/// Immutable copy of an analysis profile, taken at enqueue time so that later
/// profile edits never affect an in-flight task.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AnalysisSnapshot {
	pub analysis_id: Uuid,
	pub company_description: String,
	pub search_phrase: String,
	#[serde(default)]
	pub sources: Vec<String>,
	#[serde(default)]
	pub criteria: Vec<Criterion>,
	#[serde(default)]
	pub assigned_users: Vec<String>,
	#[serde(default)]
	pub email_recipients: Vec<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}
impl TaskStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Pending => "PENDING",
			Self::Processing => "PROCESSING",
			Self::Completed => "COMPLETED",
			Self::Failed => "FAILED",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"PENDING" => Some(Self::Pending),
			"PROCESSING" => Some(Self::Processing),
			"COMPLETED" => Some(Self::Completed),
			"FAILED" => Some(Self::Failed),
			_ => None,
		}
	}
}

/// One queued execution of the funnel for one analysis profile on one target
/// date.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AnalysisTask {
	pub task_id: Uuid,
	pub snapshot: AnalysisSnapshot,
	#[serde(with = "time_serde::date")]
	pub target_date: Date,
	pub status: TaskStatus,
	#[serde(with = "time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time_serde::option")]
	pub started_at: Option<OffsetDateTime>,
	#[serde(with = "time_serde::option")]
	pub completed_at: Option<OffsetDateTime>,
	#[serde(with = "time_serde::option")]
	pub failed_at: Option<OffsetDateTime>,
	#[serde(with = "time_serde::option")]
	pub lease_until: Option<OffsetDateTime>,
	pub worker_id: Option<String>,
	pub stats: Option<FunnelStats>,
	pub error: Option<String>,
}

/// Per-stage counters carried on a completed task for auditing.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct FunnelStats {
	pub search_candidates: u32,
	pub relevance_matched: u32,
	pub relevance_filtered: u32,
	pub extraction_succeeded: u32,
	pub extraction_failed: u32,
	pub criteria_qualified: u32,
	pub disqualified: u32,
	pub description_filtered: u32,
	pub persisted: u32,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct QueueStats {
	pub pending: u64,
	pub processing: u64,
	pub completed: u64,
	pub failed: u64,
	/// Processing tasks whose claim lease has lapsed. They are never
	/// reclaimed automatically; an operator requeues them deliberately.
	pub stale: u64,
	pub queue_length: u64,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DailyEnqueueReport {
	pub total_analyses: u32,
	pub tasks_created: u32,
}

/// A tender surfaced by the hybrid search stage. Ephemeral; retained only
/// inside the persisted search record.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TenderCandidate {
	pub id: String,
	pub name: String,
	pub organization: String,
	pub location: String,
	pub source: String,
	pub score: f32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SearchRecord {
	pub search_id: Uuid,
	pub analysis_id: Uuid,
	#[serde(with = "time_serde::date")]
	pub target_date: Date,
	pub phrase: String,
	pub candidates: Vec<TenderCandidate>,
	#[serde(with = "time_serde")]
	pub created_at: OffsetDateTime,
}

/// Where in the funnel a tender was dropped.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
	AiInitialFilter,
	FileExtraction,
	AiDescriptionFilter,
	CriteriaNotMet,
}
impl FilterStage {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::AiInitialFilter => "ai_initial_filter",
			Self::FileExtraction => "file_extraction",
			Self::AiDescriptionFilter => "ai_description_filter",
			Self::CriteriaNotMet => "criteria_not_met",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"ai_initial_filter" => Some(Self::AiInitialFilter),
			"file_extraction" => Some(Self::FileExtraction),
			"ai_description_filter" => Some(Self::AiDescriptionFilter),
			"criteria_not_met" => Some(Self::CriteriaNotMet),
			_ => None,
		}
	}
}

/// Append-only audit record for a tender excluded at some funnel stage.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FilteredTender {
	pub tender_id: String,
	pub analysis_id: Uuid,
	pub filter_stage: FilterStage,
	pub filter_reason: String,
	#[serde(with = "time_serde")]
	pub filter_timestamp: OffsetDateTime,
	pub original_match: Value,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
	Low,
	Medium,
	High,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CriteriaAnalysis {
	pub summary: String,
	pub confidence: Confidence,
	pub criteria_met: bool,
}

/// Outcome of evaluating one criterion against one tender's content.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CriteriaAnalysisResult {
	pub criteria: String,
	pub analysis: CriteriaAnalysis,
	pub weight: i32,
	#[serde(default)]
	pub is_disqualifying: bool,
	#[serde(default)]
	pub exclude_from_score: bool,
	#[serde(default)]
	pub citations: Vec<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
	Inactive,
	Active,
	Archived,
	External,
}
impl ResultStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Inactive => "inactive",
			Self::Active => "active",
			Self::Archived => "archived",
			Self::External => "external",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"inactive" => Some(Self::Inactive),
			"active" => Some(Self::Active),
			"archived" => Some(Self::Archived),
			"external" => Some(Self::External),
			_ => None,
		}
	}
}

/// The final persisted unit: one scored tender for one analysis.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TenderAnalysisResult {
	pub id: Uuid,
	pub analysis_id: Uuid,
	pub user_id: Option<String>,
	pub tender_url: String,
	pub tender_metadata: Value,
	pub tender_score: Option<f32>,
	pub criteria_analysis: Vec<CriteriaAnalysisResult>,
	pub status: ResultStatus,
	pub order_number: Option<i32>,
	#[serde(with = "time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time_serde::option")]
	pub opened_at: Option<OffsetDateTime>,
}

/// Split verdict from one relevance-classification batch.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BatchVerdict {
	pub matched: Vec<String>,
	pub rejected: Vec<RejectedCandidate>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RejectedCandidate {
	pub id: String,
	pub reason: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DescriptionVerdict {
	pub relevant: bool,
	#[serde(default)]
	pub reason: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
	Ok,
	Failed,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExtractedFile {
	pub filename: String,
	pub text: String,
}

/// What the extraction collaborator produced for one tender. A report with
/// `status = Ok` may still carry fewer files than the tender has; partial
/// extraction proceeds with whatever was read.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExtractionReport {
	pub status: ExtractionStatus,
	#[serde(default)]
	pub reason: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub files: Vec<ExtractedFile>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn task_status_round_trips_through_storage_strings() {
		for status in
			[TaskStatus::Pending, TaskStatus::Processing, TaskStatus::Completed, TaskStatus::Failed]
		{
			assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
		}
		assert_eq!(TaskStatus::parse("RUNNING"), None);
	}

	#[test]
	fn filter_stage_strings_match_audit_vocabulary() {
		assert_eq!(FilterStage::AiInitialFilter.as_str(), "ai_initial_filter");
		assert_eq!(FilterStage::CriteriaNotMet.as_str(), "criteria_not_met");
		assert_eq!(FilterStage::parse("file_extraction"), Some(FilterStage::FileExtraction));
	}

	#[test]
	fn criterion_weight_defaults_when_missing() {
		let criterion: Criterion =
			serde_json::from_value(serde_json::json!({ "name": "Budget" })).unwrap();

		assert_eq!(criterion.weight, crate::criteria_gate::DEFAULT_CRITERION_WEIGHT);
		assert!(!criterion.is_disqualifying);
	}

	#[test]
	fn snapshot_serializes_dates_as_plain_days() {
		let task = AnalysisTask {
			task_id: Uuid::nil(),
			snapshot: AnalysisSnapshot {
				analysis_id: Uuid::nil(),
				company_description: "Road construction".to_string(),
				search_phrase: "road".to_string(),
				sources: Vec::new(),
				criteria: Vec::new(),
				assigned_users: Vec::new(),
				email_recipients: Vec::new(),
			},
			target_date: time::macros::date!(2026 - 03 - 02),
			status: TaskStatus::Pending,
			created_at: time::macros::datetime!(2026-03-02 08:00 UTC),
			started_at: None,
			completed_at: None,
			failed_at: None,
			lease_until: None,
			worker_id: None,
			stats: None,
			error: None,
		};
		let value = serde_json::to_value(&task).unwrap();

		assert_eq!(value["target_date"], "2026-03-02");
		assert_eq!(value["created_at"], "2026-03-02T08:00:00Z");
	}
}
