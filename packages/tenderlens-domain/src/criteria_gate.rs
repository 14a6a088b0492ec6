use crate::types::{Criterion, CriteriaAnalysisResult};

/// Weight applied to a criterion whose profile left the weight out or set a
/// non-positive value.
pub const DEFAULT_CRITERION_WEIGHT: i32 = 1;

/// Applied when an analysis profile carries no criteria at all. Weights are
/// fixed; none of the defaults disqualify on their own.
pub fn default_criteria() -> Vec<Criterion> {
	[
		("Industry fit", 5),
		("Geographic reach", 3),
		("Contract size", 3),
		("Deadline feasibility", 2),
	]
	.into_iter()
	.map(|(name, weight)| Criterion {
		name: name.to_string(),
		weight,
		is_disqualifying: false,
		exclude_from_score: false,
	})
	.collect()
}

/// Normalizes a profile's criteria before analysis: an empty list falls back
/// to the system defaults, and non-positive weights are raised to the fixed
/// low default.
pub fn normalize_criteria(criteria: Vec<Criterion>) -> Vec<Criterion> {
	if criteria.is_empty() {
		return default_criteria();
	}

	criteria
		.into_iter()
		.map(|mut criterion| {
			if criterion.weight <= 0 {
				criterion.weight = DEFAULT_CRITERION_WEIGHT;
			}

			criterion
		})
		.collect()
}

/// True when this outcome alone excludes the tender, regardless of any other
/// criterion.
pub fn disqualified_by(result: &CriteriaAnalysisResult) -> bool {
	result.is_disqualifying && !result.analysis.criteria_met
}

/// Weighted share of met criteria over all score-bearing criteria.
///
/// `None` when every criterion is excluded from scoring (no denominator).
/// The weighted-average form is the working assumption for the production
/// scoring behavior; see the scoring tests.
pub fn weighted_score(results: &[CriteriaAnalysisResult]) -> Option<f32> {
	let mut total: i64 = 0;
	let mut met: i64 = 0;

	for result in results {
		if result.exclude_from_score {
			continue;
		}

		let weight = i64::from(result.weight.max(0));

		total += weight;

		if result.analysis.criteria_met {
			met += weight;
		}
	}

	if total == 0 {
		return None;
	}

	Some(met as f32 / total as f32)
}

#[derive(Clone, Debug, PartialEq)]
pub enum CriteriaVerdict {
	Qualified { score: Option<f32> },
	Disqualified { criterion: String },
}

/// Verdict over an accumulated outcome list: the first disqualifying failure
/// wins, otherwise the weighted score stands.
pub fn verdict(results: &[CriteriaAnalysisResult]) -> CriteriaVerdict {
	for result in results {
		if disqualified_by(result) {
			return CriteriaVerdict::Disqualified { criterion: result.criteria.clone() };
		}
	}

	CriteriaVerdict::Qualified { score: weighted_score(results) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{Confidence, CriteriaAnalysis};

	fn outcome(name: &str, weight: i32, met: bool) -> CriteriaAnalysisResult {
		CriteriaAnalysisResult {
			criteria: name.to_string(),
			analysis: CriteriaAnalysis {
				summary: String::new(),
				confidence: Confidence::High,
				criteria_met: met,
			},
			weight,
			is_disqualifying: false,
			exclude_from_score: false,
			citations: Vec::new(),
		}
	}

	#[test]
	fn score_is_weight_share_of_met_criteria() {
		let results = [outcome("Budget", 5, true), outcome("Location", 3, false)];

		assert_eq!(weighted_score(&results), Some(5.0 / 8.0));
	}

	#[test]
	fn excluded_criteria_do_not_move_the_score() {
		let mut excluded = outcome("Reporting", 50, false);

		excluded.exclude_from_score = true;

		let results = [outcome("Budget", 2, true), excluded];

		assert_eq!(weighted_score(&results), Some(1.0));
	}

	#[test]
	fn score_is_absent_when_every_criterion_is_excluded() {
		let mut only = outcome("Budget", 4, true);

		only.exclude_from_score = true;

		assert_eq!(weighted_score(&[only]), None);
	}

	#[test]
	fn empty_profile_falls_back_to_default_criteria() {
		let criteria = normalize_criteria(Vec::new());

		assert!(!criteria.is_empty());
		assert!(criteria.iter().all(|criterion| criterion.weight > 0));
		assert!(criteria.iter().all(|criterion| !criterion.is_disqualifying));
	}

	#[test]
	fn non_positive_weights_are_raised_to_the_default() {
		let criteria = normalize_criteria(vec![
			Criterion {
				name: "Budget".to_string(),
				weight: 0,
				is_disqualifying: false,
				exclude_from_score: false,
			},
			Criterion {
				name: "Location".to_string(),
				weight: -3,
				is_disqualifying: false,
				exclude_from_score: false,
			},
		]);

		assert!(criteria.iter().all(|criterion| criterion.weight == DEFAULT_CRITERION_WEIGHT));
	}

	#[test]
	fn first_disqualifying_failure_wins_the_verdict() {
		let mut budget = outcome("Budget", 5, false);

		budget.is_disqualifying = true;

		let results = [budget, outcome("Location", 3, true)];

		assert_eq!(verdict(&results), CriteriaVerdict::Disqualified { criterion: "Budget".to_string() });
	}

	#[test]
	fn met_disqualifying_criterion_does_not_disqualify() {
		let mut budget = outcome("Budget", 5, true);

		budget.is_disqualifying = true;
		assert!(!disqualified_by(&budget));
		assert_eq!(verdict(&[budget]), CriteriaVerdict::Qualified { score: Some(1.0) });
	}
}
