//! repodocs CLI — aggregate per-repository documentation into one site.
//!
//! Stages each repository's sources, runs the fragment compiler, assembles
//! ordered page trees, and writes a sharded search index.

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
