//! Result records produced by grading runs
//!
//! Every policy emits one record per submission. Records share the base
//! `score`/`message` pair and add their own fields on top; the field list is
//! declared per type so exporters can derive column headers without guessing.

mod types;

pub use types::{AucRecord, ClusteringRecord, CountPairRecord, GradeRecord};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Field names shared by every record, in column order
pub const BASE_FIELDS: &[&str] = &["score", "message"];

/// Message attached to records of submissions that exceeded their time budget
pub const TIMEOUT_MESSAGE: &str = "Timeout";

/// A schema-declared grading result.
///
/// Implementors serialize to a flat object whose keys are exactly
/// [`ResultRecord::schema`].
pub trait ResultRecord: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Policy-specific fields following the base ones
    const EXTRA_FIELDS: &'static [&'static str];

    /// Build a record carrying only base fields
    fn from_base(base: GradeRecord) -> Self;

    /// Access the base fields
    fn base(&self) -> &GradeRecord;

    /// Full ordered field list of this record type
    fn fields() -> Vec<&'static str> {
        BASE_FIELDS
            .iter()
            .chain(Self::EXTRA_FIELDS.iter())
            .copied()
            .collect()
    }

    /// Runtime introspection of the field list
    fn schema(&self) -> Vec<&'static str> {
        Self::fields()
    }

    /// Null score with an explanatory message; flags the row for manual review
    fn placeholder(message: impl Into<String>) -> Self {
        Self::from_base(GradeRecord::new(None, Some(message.into())))
    }

    /// Zero score for a submission that exceeded its time budget
    fn timed_out() -> Self {
        Self::from_base(GradeRecord::new(Some(0.0), Some(TIMEOUT_MESSAGE.to_string())))
    }

    fn score(&self) -> Option<f64> {
        self.base().score
    }

    fn message(&self) -> Option<&str> {
        self.base().message.as_deref()
    }
}
