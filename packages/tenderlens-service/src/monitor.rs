use std::{collections::HashSet, sync::Arc, time::Duration};

use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use tenderlens_config::Config;
use tenderlens_domain::{AnalysisTask, TenderAnalysisResult};

use crate::{EmailSink, Result, ResultStore, TaskQueue};

/// Watches the queue for newly completed tasks, notifies each analysis's
/// recipients about qualifying tenders, and sends one operator digest per
/// day.
///
/// All monitor state is process-local; after a restart, recently completed
/// tasks may be notified again. Delivery is at-least-once by design.
pub struct CompletionMonitor {
	cfg: Arc<Config>,
	queue: Arc<dyn TaskQueue>,
	store: Arc<dyn ResultStore>,
	email: Arc<dyn EmailSink>,
	last_check: OffsetDateTime,
	daily_summary_sent: Option<Date>,
	processed: HashSet<Uuid>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TickReport {
	pub tasks_seen: u32,
	pub emails_sent: u32,
	pub notifications_created: u32,
	pub summary_sent: bool,
}

impl CompletionMonitor {
	pub fn new(
		cfg: Arc<Config>,
		queue: Arc<dyn TaskQueue>,
		store: Arc<dyn ResultStore>,
		email: Arc<dyn EmailSink>,
	) -> Self {
		Self {
			cfg,
			queue,
			store,
			email,
			last_check: OffsetDateTime::now_utc(),
			daily_summary_sent: None,
			processed: HashSet::new(),
		}
	}

	pub async fn run(&mut self) -> Result<()> {
		let poll = Duration::from_secs(self.cfg.notify.monitor_poll_secs.max(1));

		loop {
			let now = OffsetDateTime::now_utc();

			if let Err(err) = self.tick(now).await {
				tracing::warn!(error = %err, "Monitor tick failed.");
			}

			tokio::time::sleep(poll).await;
		}
	}

	pub async fn tick(&mut self, now: OffsetDateTime) -> Result<TickReport> {
		let mut report = TickReport::default();
		let completed = self.queue.completed_since(self.last_check).await?;

		for task in &completed {
			if !self.processed.insert(task.task_id) {
				continue;
			}

			report.tasks_seen += 1;

			tracing::info!(
				task_id = %task.task_id,
				analysis_id = %task.snapshot.analysis_id,
				persisted = task.stats.as_ref().map(|stats| stats.persisted).unwrap_or(0),
				"Analysis task completed."
			);

			self.notify_task(task, &mut report).await?;
		}

		self.last_check = now;

		let stats = self.queue.stats().await?;

		if stats.stale > 0 {
			tracing::warn!(
				stale = stats.stale,
				"Processing tasks with expired leases; requeue them deliberately if their workers are gone."
			);
		}

		self.maybe_send_daily_summary(now, &mut report).await?;

		Ok(report)
	}

	async fn notify_task(&self, task: &AnalysisTask, report: &mut TickReport) -> Result<()> {
		let snapshot = &task.snapshot;
		let since = task.started_at.unwrap_or(task.created_at);
		let results = self.store.results_created_since(snapshot.analysis_id, since).await?;
		let threshold = self.cfg.notify.qualify_threshold;
		let qualifying: Vec<&TenderAnalysisResult> = results
			.iter()
			.filter(|result| result.tender_score.map(|score| score > threshold).unwrap_or(false))
			.collect();

		if qualifying.is_empty() {
			tracing::info!(
				task_id = %task.task_id,
				"No qualifying tenders; no notification sent."
			);

			return Ok(());
		}

		let recipients = if snapshot.email_recipients.is_empty() {
			&snapshot.assigned_users
		} else {
			&snapshot.email_recipients
		};
		let subject = format!("{} new relevant tender(s)", qualifying.len());
		let html = digest_html(&qualifying);

		for recipient in recipients {
			match self.email.send_email(&self.cfg.providers.email, recipient, &subject, &html).await
			{
				Ok(()) => report.emails_sent += 1,
				Err(err) => {
					tracing::warn!(
						recipient = %recipient,
						error = %err,
						"Notification e-mail failed."
					);
				},
			}
		}

		let content = qualifying
			.iter()
			.map(|result| result_name(result))
			.collect::<Vec<_>>()
			.join(", ");

		for user in &snapshot.assigned_users {
			match self
				.store
				.create_notification(user, &subject, &content, "tender_results")
				.await
			{
				Ok(_) => report.notifications_created += 1,
				Err(err) => {
					tracing::warn!(user = %user, error = %err, "Notification record failed.");
				},
			}
		}

		Ok(())
	}

	async fn maybe_send_daily_summary(
		&mut self,
		now: OffsetDateTime,
		report: &mut TickReport,
	) -> Result<()> {
		if now.hour() < self.cfg.notify.daily_summary_hour
			|| self.daily_summary_sent == Some(now.date())
		{
			return Ok(());
		}

		let start_of_day = now.replace_time(Time::MIDNIGHT);
		let today = self.queue.completed_since(start_of_day).await?;

		if today.is_empty() {
			return Ok(());
		}

		let mut sections = Vec::with_capacity(today.len());

		for task in &today {
			let since = task.started_at.unwrap_or(task.created_at);
			let results =
				self.store.results_created_since(task.snapshot.analysis_id, since).await?;
			let names = results.iter().map(|result| result_name(result)).collect::<Vec<_>>();

			sections.push(summary_section(task, &names));
		}

		let subject = format!("Daily tender analysis summary {}", now.date());
		let html = format!(
			"<h2>Completed analyses: {}</h2>{}",
			today.len(),
			sections.join("\n")
		);

		match self
			.email
			.send_email(&self.cfg.providers.email, &self.cfg.notify.operator_email, &subject, &html)
			.await
		{
			Ok(()) => {
				self.daily_summary_sent = Some(now.date());
				report.summary_sent = true;
			},
			Err(err) => {
				tracing::warn!(error = %err, "Daily summary e-mail failed.");
			},
		}

		Ok(())
	}
}

fn result_name(result: &TenderAnalysisResult) -> String {
	result
		.tender_metadata
		.get("name")
		.and_then(|name| name.as_str())
		.unwrap_or(result.tender_url.as_str())
		.to_string()
}

fn digest_html(qualifying: &[&TenderAnalysisResult]) -> String {
	let items = qualifying
		.iter()
		.map(|result| {
			let score = result
				.tender_score
				.map(|score| format!("{:.0}%", score * 100.0))
				.unwrap_or_else(|| "n/a".to_string());

			format!(
				"<li><a href=\"{}\">{}</a> — {}</li>",
				result.tender_url,
				result_name(result),
				score
			)
		})
		.collect::<Vec<_>>()
		.join("\n");

	format!("<p>New tenders matched your analysis:</p>\n<ul>\n{items}\n</ul>")
}

fn summary_section(task: &AnalysisTask, names: &[String]) -> String {
	let stats = task.stats.clone().unwrap_or_default();
	let names = if names.is_empty() { "none".to_string() } else { names.join(", ") };

	format!(
		"<h3>Analysis {}</h3>\
<p>Candidates: {} · relevance-filtered: {} · extraction-failed: {} · disqualified: {} · \
description-filtered: {} · persisted: {}</p>\
<p>Tenders: {}</p>",
		task.snapshot.analysis_id,
		stats.search_candidates,
		stats.relevance_filtered,
		stats.extraction_failed,
		stats.disqualified,
		stats.description_filtered,
		stats.persisted,
		names,
	)
}
