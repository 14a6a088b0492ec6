use uuid::Uuid;

use tenderlens_domain::TenderAnalysisResult;

use crate::{Result, ResultStore};

/// Hands out order numbers to results that do not have one yet, continuing
/// from the current maximum, in ascending creation order.
///
/// Idempotent: with no unassigned results this reads and returns the existing
/// ordering without writing. Assigned numbers are never changed. Safe in
/// practice because at most one task per analysis is in flight per day; the
/// read-then-bulk-write sequence is not defended by a lock.
pub async fn assign_order_numbers(
	store: &dyn ResultStore,
	analysis_id: Uuid,
) -> Result<Vec<TenderAnalysisResult>> {
	let mut results = store.results_for_analysis(analysis_id).await?;
	let mut next = results.iter().filter_map(|result| result.order_number).max().unwrap_or(0) + 1;
	let mut assignments = Vec::new();

	for result in &mut results {
		if result.order_number.is_some() {
			continue;
		}

		result.order_number = Some(next);
		assignments.push((result.id, next));
		next += 1;
	}

	if !assignments.is_empty() {
		store.set_order_numbers(&assignments).await?;
		tracing::info!(
			analysis_id = %analysis_id,
			assigned = assignments.len(),
			"Assigned order numbers."
		);
	}

	Ok(results)
}
