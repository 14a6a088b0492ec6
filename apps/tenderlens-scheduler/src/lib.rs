use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tenderlens_domain::time_serde;
use tenderlens_service::{
	CompletionMonitor, DefaultProviders, EmailSink, PgCatalog, PgQueue, PgStore, Producer,
	ResultStore, TaskQueue,
};

#[derive(Debug, Parser)]
#[command(
	version = tenderlens_cli::VERSION,
	rename_all = "kebab",
	styles = tenderlens_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Enqueue one task per active analysis for a target date.
	EnqueueDaily {
		#[arg(long, value_name = "YYYY-MM-DD")]
		date: String,
	},
	/// Watch completed tasks and send notifications.
	Monitor,
	/// Print queue counters.
	Stats,
	/// Return a failed or stuck task to the queue.
	Requeue {
		#[arg(long, value_name = "UUID")]
		task_id: Uuid,
	},
	/// Drop every task record.
	Clear,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = tenderlens_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = tenderlens_storage::db::Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let cfg = Arc::new(config);
	let queue: Arc<dyn TaskQueue> = Arc::new(PgQueue::new(db.clone(), &cfg.queue));

	match args.command {
		Command::EnqueueDaily { date } => {
			let target_date = time_serde::date::parse(&date)?;
			let catalog = Arc::new(PgCatalog::new(db));
			let producer = Producer::new(catalog, queue);
			let report = producer.enqueue_daily(target_date).await?;

			println!("{}", serde_json::to_string_pretty(&report)?);
		},
		Command::Monitor => {
			let store: Arc<dyn ResultStore> = Arc::new(PgStore::new(db));
			let email: Arc<dyn EmailSink> = Arc::new(DefaultProviders);
			let mut monitor = CompletionMonitor::new(cfg, queue, store, email);

			monitor.run().await?;
		},
		Command::Stats => {
			let stats = queue.stats().await?;

			println!("{}", serde_json::to_string_pretty(&stats)?);
		},
		Command::Requeue { task_id } => {
			queue.requeue(task_id).await?;

			println!("Task {task_id} requeued.");
		},
		Command::Clear => {
			let removed = queue.clear().await?;

			println!("Removed {removed} task record(s).");
		},
	}

	Ok(())
}
