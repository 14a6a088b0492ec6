pub mod criteria_gate;
pub mod passages;
pub mod time_serde;
pub mod types;

pub use criteria_gate::{
	CriteriaVerdict, DEFAULT_CRITERION_WEIGHT, default_criteria, disqualified_by,
	normalize_criteria, verdict, weighted_score,
};
pub use types::{
	AnalysisSnapshot, AnalysisTask, BatchVerdict, Confidence, Criterion, CriteriaAnalysis,
	CriteriaAnalysisResult, DescriptionVerdict, DailyEnqueueReport, ExtractedFile,
	ExtractionReport, ExtractionStatus, FilterStage, FilteredTender, FunnelStats, QueueStats,
	RejectedCandidate, ResultStatus, SearchRecord, TaskStatus, TenderAnalysisResult,
	TenderCandidate,
};
