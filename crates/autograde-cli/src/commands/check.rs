//! Validate an assignment file

use std::path::PathBuf;

use anyhow::{Context, Result};
use autograde_core::runner::enumerate_population;
use autograde_core::{AssignmentConfig, GradingMode};
use colored::*;

pub fn execute(assignment: PathBuf, population_dir: Option<PathBuf>) -> Result<()> {
    let mut config = AssignmentConfig::load(&assignment)
        .with_context(|| format!("Failed to load assignment {}", assignment.display()))?;
    if let Some(dir) = population_dir {
        config = config.with_population_dir(dir);
    }
    let mode = config.grading_mode()?;

    println!("{} {}", "✓".green(), assignment.display());
    println!("{:<12} {}", "Name:", config.name);
    println!("{:<12} {}", "Policy:", config.policy.name());
    match &mode {
        GradingMode::Execute {
            anchor,
            command,
            fixtures,
        } => {
            println!("{:<12} execute `{}` in dir of {}", "Mode:", command, anchor.file);
            match command.timeout {
                Some(timeout) => println!("{:<12} {:?}", "Timeout:", timeout),
                None => println!("{:<12} none", "Timeout:"),
            }
            for fixture in fixtures {
                println!("{:<12} {} -> {}", "Fixture:", fixture.source.display(), fixture.dest);
            }
        }
        GradingMode::Inspect { anchor } => {
            println!("{:<12} inspect {}", "Mode:", anchor.file);
        }
    }
    println!("{:<12} {}", "Sandbox:", config.sandbox_dir.display());

    match enumerate_population(&config.population_dir, &config.filters()) {
        Ok(ids) => println!(
            "{:<12} {} submissions in {}",
            "Population:",
            ids.len(),
            config.population_dir.display()
        ),
        Err(e) => println!("{:<12} {}", "Population:", e.to_string().yellow()),
    }
    Ok(())
}
