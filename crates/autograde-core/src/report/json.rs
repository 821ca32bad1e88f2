//! JSON report generation

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::error::{GradeError, GradeResult};
use crate::record::ResultRecord;

/// JSON report generator
pub struct JsonReporter;

impl JsonReporter {
    /// Object keyed by submission id, pretty printed with two-space indent
    pub fn generate<R: ResultRecord>(results: &BTreeMap<String, R>) -> GradeResult<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }

    /// Read a saved report back as untyped rows
    pub fn load(path: impl AsRef<Path>) -> GradeResult<BTreeMap<String, Value>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GradeError::io(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| GradeError::malformed(path, format!("not a results object: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AucRecord, GradeRecord};

    #[test]
    fn test_json_generation() {
        let mut results = BTreeMap::new();
        results.insert(
            "zoë".to_string(),
            AucRecord {
                base: GradeRecord::new(Some(0.0), Some("AUC score too low".to_string())),
                auc_score: Some(0.5),
            },
        );

        let json = JsonReporter::generate(&results).unwrap();
        assert_eq!(
            json,
            "{\n  \"zoë\": {\n    \"score\": 0.0,\n    \"message\": \"AUC score too low\",\n    \"auc_score\": 0.5\n  }\n}"
        );
    }

    #[test]
    fn test_load_round_trips_rows() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("hw.json");
        let mut results = BTreeMap::new();
        results.insert("alice".to_string(), GradeRecord::scored(20.0));
        std::fs::write(&path, JsonReporter::generate(&results).unwrap()).unwrap();

        let rows = JsonReporter::load(&path).unwrap();
        assert_eq!(rows["alice"]["score"], Value::from(20.0));
        assert!(rows["alice"]["message"].is_null());

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(JsonReporter::load(&path).is_err());
    }
}
