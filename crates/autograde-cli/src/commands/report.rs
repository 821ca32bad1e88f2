//! Show results from a previous run

use std::path::PathBuf;

use anyhow::{Context, Result};
use autograde_core::JsonReporter;
use autograde_core::report::generate_table;

pub fn execute(input: PathBuf) -> Result<()> {
    let rows = JsonReporter::load(&input)
        .with_context(|| format!("Failed to read results {}", input.display()))?;

    if rows.is_empty() {
        println!("No results in {}.", input.display());
        return Ok(());
    }

    println!("{}", generate_table(&rows));
    Ok(())
}
