// Entry point of the notes assistant.
//
// **Architecture Overview:**
// - `core/` = Business logic (token lifecycle, documents, assistant, threads, ELIZA)
// - `infra/` = Implementations of core traits (Microsoft identity, Graph, Perplexity, SQLite)
// - `cli/` = Command-line adapters
//
// This file's job is to:
// 1. Load configuration
// 2. Set up logging
// 3. Parse the command line and run it

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "cli/cli_layer.rs"]
mod cli;
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::cli::Cli;
use crate::config::AppConfig;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    // Logs go to stderr so command output (e.g. `status` JSON) stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Invalid configuration")?;

    cli::run(cli, config).await
}
