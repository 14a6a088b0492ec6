mod common;

use std::{collections::HashSet, sync::Arc};

use tenderlens_domain::FilterStage;
use tenderlens_service::{Error, Funnel};
use tenderlens_testkit::{MemoryIndex, MemoryStore};

use common::{
	FailingRelevance, MatchAllRelevance, RejectDescriptions, ScriptedCriteria, SelectiveRelevance,
	SpyRelevance, StubExtraction, candidate, criterion, pending_task, providers_with, snapshot,
	test_config,
};

#[tokio::test]
async fn disqualifying_criterion_short_circuits() {
	let cfg = Arc::new(test_config());
	let store = Arc::new(MemoryStore::default());
	let index = Arc::new(MemoryIndex::default());

	index.seed(vec![candidate("https://tenders.example/1", "Bridge renovation", 0.8)]);

	let criteria_engine = Arc::new(ScriptedCriteria::failing(&["Budget"]));
	let funnel = Funnel::new(
		cfg,
		store.clone(),
		index,
		providers_with(
			Arc::new(MatchAllRelevance),
			Arc::new(StubExtraction::new()),
			criteria_engine.clone(),
		),
	);
	let task = pending_task(snapshot(vec![
		criterion("Budget", 5, true),
		criterion("Location", 3, false),
	]));
	let stats = funnel.run(&task).await.expect("Funnel must finish.");

	// The tender never reaches the result set, and appears exactly once in
	// the audit trail as criteria_not_met.
	assert!(store.results().is_empty());

	let filtered = store.filtered();

	assert_eq!(filtered.len(), 1);
	assert_eq!(filtered[0].filter_stage, FilterStage::CriteriaNotMet);
	assert!(filtered[0].filter_reason.contains("Budget"));

	// "Location" is never evaluated once "Budget" disqualifies.
	assert_eq!(criteria_engine.calls(), vec!["Budget".to_string()]);
	assert_eq!(stats.disqualified, 1);
	assert_eq!(stats.criteria_qualified, 0);
	assert_eq!(stats.persisted, 0);
}

#[tokio::test]
async fn relevance_batches_run_bounded_and_results_rank_contiguously() {
	let mut config = test_config();

	config.funnel.batch_size = 50;
	config.funnel.max_concurrent_llm = 6;

	let cfg = Arc::new(config);
	let store = Arc::new(MemoryStore::default());
	let index = Arc::new(MemoryIndex::default());

	index.seed(
		(0..120)
			.map(|i| candidate(&format!("https://tenders.example/{i}"), &format!("Tender {i}"), 0.5))
			.collect(),
	);

	let relevance = Arc::new(SpyRelevance::new());
	let funnel = Funnel::new(
		cfg,
		store.clone(),
		index,
		providers_with(
			relevance.clone(),
			Arc::new(StubExtraction::new()),
			Arc::new(ScriptedCriteria::all_met()),
		),
	);
	let task = pending_task(snapshot(vec![criterion("Budget", 5, false)]));
	let stats = funnel.run(&task).await.expect("Funnel must finish.");

	assert_eq!(stats.search_candidates, 120);

	// 120 candidates at batch size 50 dispatch exactly 3 batches, never more
	// than 6 in flight.
	use std::sync::atomic::Ordering;

	assert_eq!(relevance.batches.load(Ordering::SeqCst), 3);
	assert!(relevance.max_in_flight.load(Ordering::SeqCst) <= 6);

	assert_eq!(stats.persisted, 120);

	let results = store.results();
	let mut orders: Vec<i32> = results.iter().filter_map(|result| result.order_number).collect();

	orders.sort_unstable();

	let expected: Vec<i32> = (1..=120).collect();

	assert_eq!(orders, expected);
}

#[tokio::test]
async fn stage_three_store_failure_fails_the_task_but_keeps_earlier_records() {
	let cfg = Arc::new(test_config());
	let store = Arc::new(MemoryStore::default());
	let index = Arc::new(MemoryIndex::default());

	index.seed(vec![
		candidate("https://tenders.example/keep", "Road resurfacing", 0.9),
		candidate("https://tenders.example/reject", "Catering services", 0.4),
	]);

	// The kept tender fails extraction, and the store refuses the resulting
	// file_extraction record, which is fatal for the task.
	store.fail_filtered_inserts_for(FilterStage::FileExtraction);

	let mut extraction = StubExtraction::new();

	extraction.fail.insert("https://tenders.example/keep".to_string());

	let funnel = Funnel::new(
		cfg,
		store.clone(),
		index,
		providers_with(
			Arc::new(SelectiveRelevance {
				reject: HashSet::from(["https://tenders.example/reject".to_string()]),
			}),
			Arc::new(extraction),
			Arc::new(ScriptedCriteria::all_met()),
		),
	);
	let task = pending_task(snapshot(vec![criterion("Budget", 5, false)]));
	let err = funnel.run(&task).await.expect_err("Task must fail.");

	assert!(matches!(err, Error::Storage { .. }));

	// Everything persisted before the failing stage stays persisted.
	assert_eq!(store.searches().len(), 1);

	let filtered = store.filtered();

	assert_eq!(filtered.len(), 1);
	assert_eq!(filtered[0].filter_stage, FilterStage::AiInitialFilter);

	// No result rows exist for the affected tender.
	assert!(store.results().is_empty());
}

#[tokio::test]
async fn rejected_candidates_keep_their_reasons() {
	let cfg = Arc::new(test_config());
	let store = Arc::new(MemoryStore::default());
	let index = Arc::new(MemoryIndex::default());

	index.seed(vec![
		candidate("https://tenders.example/1", "Road resurfacing", 0.9),
		candidate("https://tenders.example/2", "Office cleaning", 0.3),
		candidate("https://tenders.example/3", "Bridge inspection", 0.7),
	]);

	let funnel = Funnel::new(
		cfg,
		store.clone(),
		index,
		providers_with(
			Arc::new(SelectiveRelevance {
				reject: HashSet::from(["https://tenders.example/2".to_string()]),
			}),
			Arc::new(StubExtraction::new()),
			Arc::new(ScriptedCriteria::all_met()),
		),
	);
	let task = pending_task(snapshot(vec![criterion("Budget", 5, false)]));
	let stats = funnel.run(&task).await.expect("Funnel must finish.");

	assert_eq!(stats.relevance_matched, 2);
	assert_eq!(stats.relevance_filtered, 1);
	assert_eq!(stats.persisted, 2);

	let filtered = store.filtered();

	assert_eq!(filtered.len(), 1);
	assert_eq!(filtered[0].tender_id, "https://tenders.example/2");
	assert_eq!(filtered[0].filter_reason, "Out of scope.");

	let results = store.results();

	assert_eq!(results.len(), 2);
	assert!(results.iter().all(|result| result.tender_score == Some(1.0)));
	assert!(results.iter().all(|result| !result.criteria_analysis.is_empty()));
}

#[tokio::test]
async fn description_filter_drops_survivors_before_persistence() {
	let cfg = Arc::new(test_config());
	let store = Arc::new(MemoryStore::default());
	let index = Arc::new(MemoryIndex::default());

	index.seed(vec![candidate("https://tenders.example/1", "Road resurfacing", 0.9)]);

	let funnel = Funnel::new(
		cfg,
		store.clone(),
		index,
		providers_with(
			Arc::new(RejectDescriptions),
			Arc::new(StubExtraction::new()),
			Arc::new(ScriptedCriteria::all_met()),
		),
	);
	let task = pending_task(snapshot(vec![criterion("Budget", 5, false)]));
	let stats = funnel.run(&task).await.expect("Funnel must finish.");

	assert_eq!(stats.criteria_qualified, 1);
	assert_eq!(stats.description_filtered, 1);
	assert_eq!(stats.persisted, 0);
	assert!(store.results().is_empty());

	let filtered = store.filtered();

	assert_eq!(filtered.len(), 1);
	assert_eq!(filtered[0].filter_stage, FilterStage::AiDescriptionFilter);
	assert_eq!(filtered[0].filter_reason, "Different trade.");
}

#[tokio::test]
async fn errored_batch_degrades_to_zero_matches_without_failing_the_task() {
	let cfg = Arc::new(test_config());
	let store = Arc::new(MemoryStore::default());
	let index = Arc::new(MemoryIndex::default());

	index.seed(vec![
		candidate("https://tenders.example/1", "Road resurfacing", 0.9),
		candidate("https://tenders.example/2", "Bridge inspection", 0.7),
	]);

	let funnel = Funnel::new(
		cfg,
		store.clone(),
		index,
		providers_with(
			Arc::new(FailingRelevance),
			Arc::new(StubExtraction::new()),
			Arc::new(ScriptedCriteria::all_met()),
		),
	);
	let task = pending_task(snapshot(vec![criterion("Budget", 5, false)]));
	let stats = funnel.run(&task).await.expect("A failed batch must not abort the task.");

	assert_eq!(stats.relevance_matched, 0);
	assert_eq!(stats.relevance_filtered, 2);
	assert_eq!(stats.persisted, 0);
	assert!(
		store
			.filtered()
			.iter()
			.all(|record| record.filter_reason.contains("Relevance batch failed"))
	);
}

#[tokio::test]
async fn extraction_content_lands_in_the_tender_index() {
	let cfg = Arc::new(test_config());
	let store = Arc::new(MemoryStore::default());
	let index = Arc::new(MemoryIndex::default());

	index.seed(vec![candidate("https://tenders.example/1", "Road resurfacing", 0.9)]);

	let funnel = Funnel::new(
		cfg,
		store.clone(),
		index.clone(),
		providers_with(
			Arc::new(MatchAllRelevance),
			Arc::new(StubExtraction::new()),
			Arc::new(ScriptedCriteria::all_met()),
		),
	);
	let task = pending_task(snapshot(vec![criterion("Budget", 5, false)]));

	funnel.run(&task).await.expect("Funnel must finish.");

	let upserted = index.upserted();

	assert_eq!(upserted.len(), 1);
	assert!(upserted.values().next().unwrap().iter().any(|text| text.contains("Tender notice")));
}
