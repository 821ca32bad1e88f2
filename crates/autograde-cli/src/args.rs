//! CLI argument definitions using clap
//!
//! - autograde run <assignment>      # Grade a population, write CSV/JSON/log
//! - autograde check <assignment>    # Validate an assignment file
//! - autograde report <results.json> # Render saved results as a table

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autograde")]
#[command(about = "Sequential sandboxed batch grader for student submissions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Grade every submission of an assignment
    Run(RunArgs),

    /// Validate an assignment file and list the submissions it would grade
    Check {
        /// Assignment file (.yaml, .yml or .json)
        assignment: PathBuf,

        /// Override the population directory
        #[arg(long, env = "AUTOGRADE_POPULATION_DIR")]
        population_dir: Option<PathBuf>,
    },

    /// Show results from a previous run
    Report {
        /// The `<name>.json` file written by `autograde run`
        input: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Assignment file (.yaml, .yml or .json)
    pub assignment: PathBuf,

    /// Override the population directory
    #[arg(long, env = "AUTOGRADE_POPULATION_DIR")]
    pub population_dir: Option<PathBuf>,

    /// Override the sandbox directory
    #[arg(long)]
    pub sandbox_dir: Option<PathBuf>,

    /// Override the output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Only grade these submission ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub allow: Option<Vec<String>>,

    /// Never grade these submission ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub deny: Option<Vec<String>>,

    /// Do not echo batch log lines to the terminal
    #[arg(long, short)]
    pub quiet: bool,
}
