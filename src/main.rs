use anyhow::Result;
use clap::Parser;
use sportello::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    sportello::telemetry::init();
    let cli = Cli::parse();
    cli.run().await
}
