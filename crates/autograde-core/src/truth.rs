//! Loading of `id,value` tables
//!
//! Ground-truth references and the prediction files submissions produce share
//! one format: a header line that is discarded, then one `id,value` pair per
//! line.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use crate::error::{GradeError, GradeResult};

/// Read-only mapping from item id to a label or score
pub type GroundTruth<V> = BTreeMap<i64, V>;

/// Load a header-plus-rows table from disk.
pub fn load_table<V>(path: impl AsRef<Path>) -> GradeResult<BTreeMap<i64, V>>
where
    V: FromStr,
    V::Err: Display,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let root = path.parent().unwrap_or(Path::new("."));
            GradeError::not_found(name, root)
        }
        _ => GradeError::io(path, e),
    })?;
    parse_table(path, &content)
}

/// Parse table content; `origin` only labels errors.
pub fn parse_table<V>(origin: &Path, content: &str) -> GradeResult<BTreeMap<i64, V>>
where
    V: FromStr,
    V::Err: Display,
{
    let mut table = BTreeMap::new();

    for (index, line) in content.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 2 {
            return Err(GradeError::malformed(
                origin,
                format!("line {}: expected 2 columns, found {}", line_no, fields.len()),
            ));
        }

        let id: i64 = fields[0].trim().parse().map_err(|e| {
            GradeError::malformed(origin, format!("line {}: invalid id {:?}: {}", line_no, fields[0], e))
        })?;
        let value: V = fields[1].trim().parse().map_err(|e| {
            GradeError::malformed(
                origin,
                format!("line {}: invalid value {:?}: {}", line_no, fields[1].trim(), e),
            )
        })?;

        table.insert(id, value);
    }

    Ok(table)
}
