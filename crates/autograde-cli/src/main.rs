//! Autograde CLI application
//!
//! Grades a directory of student submissions against one assignment file.
//!
//! # Installation
//!
//! ```bash
//! cargo install --path crates/autograde-cli
//! ```
//!
//! Set `RUST_LOG=debug` for verbose logging outside the batch log.

mod args;
mod commands;

use anyhow::Result;
use clap::Parser;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Check {
            assignment,
            population_dir,
        } => commands::check::execute(assignment, population_dir),
        Commands::Report { input } => commands::report::execute(input),
    }
}
