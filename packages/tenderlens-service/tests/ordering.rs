use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use tenderlens_domain::{ResultStatus, TenderAnalysisResult};
use tenderlens_service::{ResultStore, ordering::assign_order_numbers};
use tenderlens_testkit::MemoryStore;

fn result(analysis_id: Uuid, url: &str, created_at: OffsetDateTime) -> TenderAnalysisResult {
	TenderAnalysisResult {
		id: Uuid::new_v4(),
		analysis_id,
		user_id: None,
		tender_url: url.to_string(),
		tender_metadata: serde_json::json!({ "name": url }),
		tender_score: Some(0.8),
		criteria_analysis: Vec::new(),
		status: ResultStatus::Inactive,
		order_number: None,
		created_at,
		opened_at: None,
	}
}

#[tokio::test]
async fn numbers_follow_creation_order_and_stay_put() {
	let store = Arc::new(MemoryStore::default());
	let analysis_id = Uuid::new_v4();
	let base = OffsetDateTime::now_utc();

	for (offset, url) in [(2, "c"), (0, "a"), (1, "b")] {
		store
			.upsert_result(&result(analysis_id, url, base + Duration::seconds(offset)))
			.await
			.unwrap();
	}

	let ordered = assign_order_numbers(store.as_ref(), analysis_id).await.unwrap();
	let assigned: Vec<(String, Option<i32>)> = ordered
		.iter()
		.map(|result| (result.tender_url.clone(), result.order_number))
		.collect();

	assert_eq!(
		assigned,
		vec![
			("a".to_string(), Some(1)),
			("b".to_string(), Some(2)),
			("c".to_string(), Some(3)),
		]
	);

	// A second pass with nothing new is a no-op.
	let again = assign_order_numbers(store.as_ref(), analysis_id).await.unwrap();
	let again: Vec<(String, Option<i32>)> =
		again.iter().map(|result| (result.tender_url.clone(), result.order_number)).collect();

	assert_eq!(assigned, again);
}

#[tokio::test]
async fn numbers_continue_from_the_prior_maximum() {
	let store = Arc::new(MemoryStore::default());
	let analysis_id = Uuid::new_v4();
	let base = OffsetDateTime::now_utc();

	for (offset, url) in [(0, "a"), (1, "b")] {
		store
			.upsert_result(&result(analysis_id, url, base + Duration::seconds(offset)))
			.await
			.unwrap();
	}

	assign_order_numbers(store.as_ref(), analysis_id).await.unwrap();

	// A later run adds two more results.
	for (offset, url) in [(10, "d"), (9, "c")] {
		store
			.upsert_result(&result(analysis_id, url, base + Duration::seconds(offset)))
			.await
			.unwrap();
	}

	let ordered = assign_order_numbers(store.as_ref(), analysis_id).await.unwrap();
	let numbers: Vec<i32> = ordered.iter().filter_map(|result| result.order_number).collect();

	assert_eq!(numbers, vec![1, 2, 3, 4]);

	let by_url: Vec<(String, i32)> = ordered
		.iter()
		.map(|result| (result.tender_url.clone(), result.order_number.unwrap()))
		.collect();

	// "c" was created before "d", so it takes the lower number.
	assert!(by_url.contains(&("c".to_string(), 3)));
	assert!(by_url.contains(&("d".to_string(), 4)));
}

#[tokio::test]
async fn other_analyses_do_not_share_the_sequence() {
	let store = Arc::new(MemoryStore::default());
	let first = Uuid::new_v4();
	let second = Uuid::new_v4();
	let base = OffsetDateTime::now_utc();

	store.upsert_result(&result(first, "a", base)).await.unwrap();
	store.upsert_result(&result(second, "b", base)).await.unwrap();

	let first_ordered = assign_order_numbers(store.as_ref(), first).await.unwrap();
	let second_ordered = assign_order_numbers(store.as_ref(), second).await.unwrap();

	assert_eq!(first_ordered[0].order_number, Some(1));
	assert_eq!(second_ordered[0].order_number, Some(1));
}
