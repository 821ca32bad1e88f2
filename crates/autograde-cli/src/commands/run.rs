//! Grade a population

use std::path::Path;

use anyhow::{Context, Result};
use autograde_core::report::{create_run_dir, write_outputs};
use autograde_core::{
    AssignmentConfig, AucPolicy, BatchLog, BatchReport, BatchRunner, ClusteringPolicy,
    CountPairPolicy, GradingPolicy, Harness, PolicyConfig, ResultRecord, UnitTestLogPolicy,
};
use colored::*;

use crate::args::RunArgs;

/// Apply command-line overrides on top of the assignment file
pub fn resolve_config(args: &RunArgs) -> Result<AssignmentConfig> {
    let mut config = AssignmentConfig::load(&args.assignment)
        .with_context(|| format!("Failed to load assignment {}", args.assignment.display()))?;

    if let Some(dir) = &args.population_dir {
        config = config.with_population_dir(dir);
    }
    if let Some(dir) = &args.sandbox_dir {
        config = config.with_sandbox_dir(dir);
    }
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(allow) = &args.allow {
        config = config.with_allow(allow.clone());
    }
    if let Some(deny) = &args.deny {
        config = config.with_deny(deny.clone());
    }
    Ok(config)
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let run_dir = create_run_dir(&config.output_dir, &config.name)
        .context("Failed to create run directory")?;
    let log = BatchLog::open(&config.name, &run_dir, !args.quiet)
        .context("Failed to open batch log")?;
    let harness = Harness::new(config.sandbox(), config.grading_mode()?);

    // Ground truth loading is part of the batch, so it logs to the batch log
    let dispatch = log.dispatch().clone();
    tracing::dispatcher::with_default(&dispatch, || {
        tracing::info!("Assignment {} with policy {}", config.name, config.policy.name());
    });

    match config.policy.clone() {
        PolicyConfig::Clustering(params) => {
            let policy = tracing::dispatcher::with_default(&dispatch, || ClusteringPolicy::load(params))
                .context("Failed to load clustering ground truth")?;
            grade(policy, harness, log, &config, &run_dir).await
        }
        PolicyConfig::Auc(params) => {
            let policy = tracing::dispatcher::with_default(&dispatch, || AucPolicy::load(params))
                .context("Failed to load AUC ground truth")?;
            grade(policy, harness, log, &config, &run_dir).await
        }
        PolicyConfig::UnitTestLog(params) => {
            grade(UnitTestLogPolicy::new(params), harness, log, &config, &run_dir).await
        }
        PolicyConfig::CountPair(params) => {
            grade(CountPairPolicy::new(params), harness, log, &config, &run_dir).await
        }
    }
}

async fn grade<P: GradingPolicy>(
    policy: P,
    harness: Harness,
    log: BatchLog,
    config: &AssignmentConfig,
    run_dir: &Path,
) -> Result<()> {
    let runner = BatchRunner::new(policy, harness, log).with_filters(config.filters());
    let report = runner
        .run(&config.population_dir)
        .await
        .with_context(|| format!("Grading {} aborted", config.name))?;

    let outputs = tracing::dispatcher::with_default(runner.log().dispatch(), || {
        write_outputs(run_dir, &config.name, &report.results)
    })
    .context("Failed to write results")?;
    runner.finish().context("Failed to flush batch log")?;

    print_summary(&report);
    println!("Results: {}", outputs.dir.display());
    Ok(())
}

fn print_summary<R: ResultRecord>(report: &BatchReport<R>) {
    println!();
    println!(
        "{} {} processed, {} successful, {} failed",
        "Done:".bold(),
        report.processed(),
        report.successful().to_string().green(),
        if report.failed.is_empty() {
            "0".normal()
        } else {
            report.failed.len().to_string().red()
        }
    );
    if !report.failed.is_empty() {
        println!("  {} {}", "Failed:".red(), report.failed.join(", "));
    }
    if !report.timed_out.is_empty() {
        println!("  {} {}", "Timed out:".yellow(), report.timed_out.join(", "));
    }
}
