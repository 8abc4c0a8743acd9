//! Kramar command line.
//!
//! Usage:
//!   kramar --db kramar.db hug --user <ID> --send profile,healthPlan --receive profile
//!   kramar partners
//!   kramar version --current 1.2.0
//!
//! Built without the `native-ble` feature, `hug` only works with `--touch`,
//! which runs the simulated fallback.

use anyhow::Result;
use clap::Parser;
use kramar_cli::{run, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let mut stdout = std::io::stdout();
    run(cli, &mut stdout).await
}
