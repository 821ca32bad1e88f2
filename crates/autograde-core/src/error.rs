//! Error types for the grading engine

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for grading operations
pub type GradeResult<T> = Result<T, GradeError>;

/// Everything that can go wrong while grading one submission or a batch.
///
/// A command exceeding its budget is not an error: the driver reports it as
/// [`Outcome::TimedOut`](crate::runner::Outcome::TimedOut) and the policy
/// turns it into a zero record.
///
/// Only [`GradeError::Population`] is fatal to a batch. Every other variant
/// raised while grading a submission, `Config` included, is caught at the
/// per-submission boundary and turned into a placeholder record; `Config`
/// errors are meant to be caught earlier by `AssignmentConfig::validate`.
#[derive(Error, Debug)]
pub enum GradeError {
    /// The anchor file or produced artifact is absent from the searched tree
    #[error("File {target} not found in {}", root.display())]
    NotFound { target: String, root: PathBuf },

    /// Sandbox copy/clear or another filesystem operation failed
    #[error("IO error on {}: {message}", path.display())]
    Io { message: String, path: PathBuf },

    /// A produced or reference file is structurally invalid
    #[error("Malformed artifact {}: {reason}", path.display())]
    MalformedArtifact { path: PathBuf, reason: String },

    /// The grading command could not be started
    #[error("Failed to spawn grading command: {0}")]
    Spawn(String),

    /// The population directory cannot be enumerated
    #[error("Cannot read population directory {}: {message}", path.display())]
    Population { message: String, path: PathBuf },

    /// Invalid assignment configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The policy does not implement the requested grading procedure
    #[error("Policy {policy} does not support {procedure}")]
    Unsupported {
        policy: &'static str,
        procedure: &'static str,
    },

    /// Output serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GradeError {
    pub fn not_found(target: impl Into<String>, root: impl AsRef<Path>) -> Self {
        Self::NotFound {
            target: target.into(),
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn io(path: impl AsRef<Path>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            message: err.to_string(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn malformed(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::MalformedArtifact {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Whether the error aborts the whole batch rather than one submission
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Population { .. })
    }
}

impl From<serde_json::Error> for GradeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
