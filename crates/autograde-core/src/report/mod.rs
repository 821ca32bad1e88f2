//! Batch output generation
//!
//! Writes the durable CSV and JSON outputs of a run and renders saved
//! results as a terminal table.

mod csv;
mod json;

pub use csv::{CsvReporter, ID_COLUMN};
pub use json::JsonReporter;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{GradeError, GradeResult};
use crate::logging::timestamp;
use crate::record::{BASE_FIELDS, ResultRecord};

/// Files written for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutputs {
    pub dir: PathBuf,
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Fresh `<output_dir>/<timestamp>-<name>` directory for one run
pub fn create_run_dir(output_dir: impl AsRef<Path>, name: &str) -> GradeResult<PathBuf> {
    let dir = output_dir
        .as_ref()
        .join(format!("{}-{}", timestamp(), name));
    std::fs::create_dir_all(&dir).map_err(|e| GradeError::io(&dir, e))?;
    Ok(dir)
}

/// Write `<name>.csv` and `<name>.json` into `dir`
pub fn write_outputs<R: ResultRecord>(
    dir: impl AsRef<Path>,
    name: &str,
    results: &BTreeMap<String, R>,
) -> GradeResult<RunOutputs> {
    let dir = dir.as_ref();
    let outputs = RunOutputs {
        dir: dir.to_path_buf(),
        csv: dir.join(format!("{}.csv", name)),
        json: dir.join(format!("{}.json", name)),
    };

    let csv = CsvReporter::generate(results)?;
    std::fs::write(&outputs.csv, csv).map_err(|e| GradeError::io(&outputs.csv, e))?;
    let json = JsonReporter::generate(results)?;
    std::fs::write(&outputs.json, json).map_err(|e| GradeError::io(&outputs.json, e))?;

    tracing::info!(
        "Results written to {} and .json",
        outputs.csv.display()
    );
    Ok(outputs)
}

/// Render untyped result rows as a fixed-width table.
///
/// Base columns come first, then every other field seen in any row, sorted.
pub fn generate_table(rows: &BTreeMap<String, Value>) -> String {
    let mut extra: Vec<&str> = rows
        .values()
        .filter_map(Value::as_object)
        .flat_map(|row| row.keys().map(String::as_str))
        .filter(|key| !BASE_FIELDS.contains(key))
        .collect();
    extra.sort_unstable();
    extra.dedup();

    let columns: Vec<&str> = BASE_FIELDS.iter().copied().chain(extra).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|(id, row)| {
            std::iter::once(id.clone())
                .chain(columns.iter().map(|c| table_cell(row.get(*c))))
                .collect()
        })
        .collect();

    let header: Vec<String> = std::iter::once(ID_COLUMN.to_string())
        .chain(columns.iter().map(|c| c.to_string()))
        .collect();
    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header[i].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut output = String::new();
    push_table_row(&mut output, &header, &widths);
    let rule: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    output.push_str(&format!("{:-<1$}\n", "", rule));
    for row in &cells {
        push_table_row(&mut output, row, &widths);
    }

    let scored: Vec<f64> = rows
        .values()
        .filter_map(|row| row.get("score").and_then(Value::as_f64))
        .collect();
    output.push_str(&format!("{:-<1$}\n", "", rule));
    output.push_str(&format!(
        "{} submissions, {} scored, {} need review",
        rows.len(),
        scored.len(),
        rows.len() - scored.len()
    ));
    if !scored.is_empty() {
        let mean = scored.iter().sum::<f64>() / scored.len() as f64;
        output.push_str(&format!(", mean score {:.2}", mean));
    }
    output.push('\n');
    output
}

fn table_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => {
            // Multi-line diagnostics collapse to their first line
            let first = s.lines().next().unwrap_or_default();
            if first.chars().count() > 40 {
                let truncated: String = first.chars().take(37).collect();
                format!("{}...", truncated)
            } else {
                first.to_string()
            }
        }
        Some(other) => other.to_string(),
    }
}

fn push_table_row(output: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<1$}", cell, width))
        .collect();
    output.push_str(padded.join("  ").trim_end());
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CountPairRecord, GradeRecord};
    use tempfile::TempDir;

    #[test]
    fn test_outputs_land_in_run_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = create_run_dir(temp_dir.path().join("logs"), "hw2p3").unwrap();
        let dir_name = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(dir_name.ends_with("-hw2p3"));

        let mut results = BTreeMap::new();
        results.insert("alice".to_string(), CountPairRecord::placeholder("No output"));
        let outputs = write_outputs(&dir, "hw2p3", &results).unwrap();

        assert_eq!(outputs.csv, dir.join("hw2p3.csv"));
        let csv = std::fs::read_to_string(&outputs.csv).unwrap();
        assert!(csv.starts_with("student,score,message,score_uniform,score_biased\r\n"));
        let json = std::fs::read_to_string(&outputs.json).unwrap();
        assert!(json.contains("\"No output\""));
    }

    #[test]
    fn test_table_lists_base_columns_first() {
        let mut rows = BTreeMap::new();
        rows.insert(
            "alice".to_string(),
            serde_json::to_value(CountPairRecord {
                base: GradeRecord::scored(14.0),
                score_uniform: Some(4),
                score_biased: Some(2),
            })
            .unwrap(),
        );
        rows.insert(
            "bob".to_string(),
            serde_json::to_value(CountPairRecord::placeholder("line one\nline two")).unwrap(),
        );

        let table = generate_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("student  score  message"));
        assert!(lines[0].ends_with("score_biased  score_uniform"));
        assert!(lines[2].starts_with("alice"));
        assert!(lines[3].contains("line one"));
        assert!(!table.contains("line two"));
        assert!(table.ends_with("2 submissions, 1 scored, 1 need review, mean score 14.00\n"));
    }
}
