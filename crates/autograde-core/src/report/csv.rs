//! CSV export

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::GradeResult;
use crate::record::ResultRecord;

/// First column of every row
pub const ID_COLUMN: &str = "student";

/// CSV report generator
pub struct CsvReporter;

impl CsvReporter {
    /// Header plus one row per submission in id order. Columns follow the
    /// record schema; nulls become empty cells. Rows end with CRLF.
    pub fn generate<R: ResultRecord>(results: &BTreeMap<String, R>) -> GradeResult<String> {
        let schema = results
            .values()
            .next()
            .map(R::schema)
            .unwrap_or_else(R::fields);

        let mut output = String::new();
        let header: Vec<&str> = std::iter::once(ID_COLUMN).chain(schema.iter().copied()).collect();
        push_row(&mut output, header.iter().map(|s| s.to_string()));

        for (id, record) in results {
            let value = serde_json::to_value(record)?;
            let cells = schema
                .iter()
                .map(|field| cell(value.get(*field).unwrap_or(&Value::Null)));
            push_row(&mut output, std::iter::once(id.clone()).chain(cells));
        }
        Ok(output)
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) => format!("{:?}", f),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn push_row(output: &mut String, cells: impl Iterator<Item = String>) {
    let row: Vec<String> = cells.map(|c| quote(&c)).collect();
    output.push_str(&row.join(","));
    output.push_str("\r\n");
}

fn quote(cell: &str) -> String {
    if cell.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
