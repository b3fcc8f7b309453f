//! appointments-node CLI entry point.

mod cli;

use appointments_node::NodeBuilder;
use clap::Parser;
use cli::Cli;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let json_logs = cli.json_logs;
    let config = cli.into_config()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    info!("appointments-node v{}", env!("CARGO_PKG_VERSION"));

    let mut node = NodeBuilder::new(config).build().await?;
    node.run().await?;

    info!("Goodbye!");
    Ok(())
}
