//! NodeVault CLI Binary

use anyhow::Context;
use clap::Parser;
use nodevault::logging::init_logging;
use nodevault::tooling::cli::{Cli, CliContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = cli.load_config().context("Error loading configuration")?;
    init_logging(Some(&config.logging)).context("Error initializing logging")?;

    let context =
        CliContext::new(config, cli.format).context("Error opening the node store")?;
    let output = context.execute(&cli.command).await?;
    println!("{}", output);
    Ok(())
}
