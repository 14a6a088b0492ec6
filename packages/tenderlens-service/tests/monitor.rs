mod common;

use std::{sync::Arc, time::Duration as StdDuration};

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use tenderlens_domain::{FunnelStats, ResultStatus, TenderAnalysisResult};
use tenderlens_service::{CompletionMonitor, ResultStore, TaskQueue};
use tenderlens_testkit::{MemoryMailer, MemoryQueue, MemoryStore};

use common::{snapshot, test_config};

fn scored_result(analysis_id: Uuid, url: &str, name: &str, score: f32) -> TenderAnalysisResult {
	TenderAnalysisResult {
		id: Uuid::new_v4(),
		analysis_id,
		user_id: None,
		tender_url: url.to_string(),
		tender_metadata: serde_json::json!({ "name": name }),
		tender_score: Some(score),
		criteria_analysis: Vec::new(),
		status: ResultStatus::Inactive,
		order_number: None,
		created_at: OffsetDateTime::now_utc(),
		opened_at: None,
	}
}

struct Rig {
	queue: Arc<MemoryQueue>,
	store: Arc<MemoryStore>,
	mailer: Arc<MemoryMailer>,
	monitor: CompletionMonitor,
}

fn rig(daily_summary_hour: u8) -> Rig {
	let mut config = test_config();

	config.notify.daily_summary_hour = daily_summary_hour;

	let queue = Arc::new(MemoryQueue::default());
	let store = Arc::new(MemoryStore::default());
	let mailer = Arc::new(MemoryMailer::default());
	let monitor = CompletionMonitor::new(
		Arc::new(config),
		queue.clone(),
		store.clone(),
		mailer.clone(),
	);

	Rig { queue, store, mailer, monitor }
}

async fn complete_task(rig: &Rig, snapshot: tenderlens_domain::AnalysisSnapshot) -> Uuid {
	let analysis_id = snapshot.analysis_id;

	rig.queue.enqueue(&snapshot, OffsetDateTime::now_utc().date()).await.unwrap();

	let task = rig
		.queue
		.claim("worker-1", StdDuration::ZERO)
		.await
		.unwrap()
		.expect("A pending task.");

	rig.queue
		.complete(task.task_id, &FunnelStats { persisted: 2, ..FunnelStats::default() })
		.await
		.unwrap();

	analysis_id
}

#[tokio::test]
async fn qualifying_tenders_notify_every_recipient() {
	// Summary hour 24 can never be reached, keeping the daily digest out of this test.
	let mut rig = rig(24);
	let mut profile = snapshot(Vec::new());

	profile.email_recipients =
		vec!["buyer@example.com".to_string(), "lead@example.com".to_string()];

	let analysis_id = complete_task(&rig, profile).await;

	rig.store
		.upsert_result(&scored_result(analysis_id, "https://t/1", "Road works", 0.8))
		.await
		.unwrap();
	rig.store
		.upsert_result(&scored_result(analysis_id, "https://t/2", "Catering", 0.4))
		.await
		.unwrap();

	let report = rig.monitor.tick(OffsetDateTime::now_utc() + Duration::seconds(1)).await.unwrap();

	assert_eq!(report.tasks_seen, 1);
	assert_eq!(report.emails_sent, 2);
	assert_eq!(report.notifications_created, 1);

	let sent = rig.mailer.sent();

	assert_eq!(sent.len(), 2);
	assert!(sent.iter().any(|mail| mail.to == "buyer@example.com"));
	assert!(sent.iter().any(|mail| mail.to == "lead@example.com"));
	// Only the tender above the threshold shows up.
	assert!(sent[0].html.contains("Road works"));
	assert!(!sent[0].html.contains("Catering"));

	let notifications = rig.store.notifications();

	assert_eq!(notifications.len(), 1);
	assert_eq!(notifications[0].user_id, "user-1");
}

#[tokio::test]
async fn no_email_when_nothing_qualifies() {
	let mut rig = rig(24);
	let analysis_id = complete_task(&rig, snapshot(Vec::new())).await;

	rig.store
		.upsert_result(&scored_result(analysis_id, "https://t/1", "Catering", 0.4))
		.await
		.unwrap();

	let report = rig.monitor.tick(OffsetDateTime::now_utc() + Duration::seconds(1)).await.unwrap();

	assert_eq!(report.tasks_seen, 1);
	assert_eq!(report.emails_sent, 0);
	assert!(rig.mailer.sent().is_empty());
}

#[tokio::test]
async fn recipients_fall_back_to_assigned_users() {
	let mut rig = rig(24);
	let mut profile = snapshot(Vec::new());

	profile.email_recipients = Vec::new();
	profile.assigned_users = vec!["user-1".to_string()];

	let analysis_id = complete_task(&rig, profile).await;

	rig.store
		.upsert_result(&scored_result(analysis_id, "https://t/1", "Road works", 0.9))
		.await
		.unwrap();

	let report = rig.monitor.tick(OffsetDateTime::now_utc() + Duration::seconds(1)).await.unwrap();

	assert_eq!(report.emails_sent, 1);
	assert_eq!(rig.mailer.sent()[0].to, "user-1");
}

#[tokio::test]
async fn completed_tasks_are_not_renotified() {
	let mut rig = rig(24);
	let analysis_id = complete_task(&rig, snapshot(Vec::new())).await;

	rig.store
		.upsert_result(&scored_result(analysis_id, "https://t/1", "Road works", 0.9))
		.await
		.unwrap();

	let first = rig.monitor.tick(OffsetDateTime::now_utc() + Duration::seconds(1)).await.unwrap();

	assert_eq!(first.tasks_seen, 1);

	let second = rig.monitor.tick(OffsetDateTime::now_utc() + Duration::seconds(2)).await.unwrap();

	assert_eq!(second.tasks_seen, 0);
	assert_eq!(rig.mailer.sent().len(), 1);
}

#[tokio::test]
async fn daily_summary_goes_out_once_per_day() {
	// Hour zero: any tick today is past the summary hour.
	let mut rig = rig(0);

	complete_task(&rig, snapshot(Vec::new())).await;

	let first = rig.monitor.tick(OffsetDateTime::now_utc() + Duration::seconds(1)).await.unwrap();

	assert!(first.summary_sent);

	let operator_mail: Vec<_> = rig
		.mailer
		.sent()
		.into_iter()
		.filter(|mail| mail.to == "ops@example.com")
		.collect();

	assert_eq!(operator_mail.len(), 1);
	assert!(operator_mail[0].subject.contains("summary"));

	let second = rig.monitor.tick(OffsetDateTime::now_utc() + Duration::seconds(2)).await.unwrap();

	assert!(!second.summary_sent);
	assert_eq!(
		rig.mailer.sent().iter().filter(|mail| mail.to == "ops@example.com").count(),
		1
	);
}
