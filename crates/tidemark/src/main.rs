//! tidemark CLI
//!
//! Command-line tool for applying, reverting and generating migrations and
//! for running seeders. Only SQL units are available here; embed
//! [`tidemark::cli::run`] in your own binary to register Rust units.

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use tidemark::cli::{self, Cli};
use tidemark::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    cli::run(cli, MigrationRegistry::new(), SeedRegistry::new()).await?;

    Ok(())
}
