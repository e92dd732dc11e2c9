//! collection-index CLI: build a collection index from versioned collection bundles.
//!
//! Reads collection bundles from files or directories and writes one index
//! document listing every collection and its available versions.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
