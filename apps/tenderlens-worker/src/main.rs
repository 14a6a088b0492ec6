use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	tenderlens_worker::run(tenderlens_worker::Args::parse()).await
}
