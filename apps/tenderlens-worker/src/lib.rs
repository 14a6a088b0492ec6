pub mod worker;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tenderlens_service::{
	Funnel, PgQueue, PgStore, Providers, QdrantTenderIndex, ResultStore, TaskQueue, TenderIndex,
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
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = tenderlens_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = tenderlens_storage::db::Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let qdrant = tenderlens_storage::qdrant::QdrantStore::new(&config.storage.qdrant)?;
	let cfg = Arc::new(config);
	let providers = Providers::default();
	let index = Arc::new(QdrantTenderIndex::new(
		qdrant,
		cfg.providers.embedding.clone(),
		providers.embedding.clone(),
	));

	index.ensure_content_collection().await?;

	let index: Arc<dyn TenderIndex> = index;
	let queue: Arc<dyn TaskQueue> = Arc::new(PgQueue::new(db.clone(), &cfg.queue));
	let store: Arc<dyn ResultStore> = Arc::new(PgStore::new(db));
	let funnel = Funnel::new(cfg, store, index, providers);
	let worker_id = format!("worker-{}", Uuid::new_v4().simple());
	let state = worker::WorkerState { worker_id, queue, funnel };

	worker::run_worker(state).await
}
