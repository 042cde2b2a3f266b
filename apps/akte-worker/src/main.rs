use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = akte_worker::Args::parse();

	akte_worker::run(args).await
}
