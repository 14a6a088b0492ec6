use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	tenderlens_scheduler::run(tenderlens_scheduler::Args::parse()).await
}
