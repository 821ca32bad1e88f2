//! Locating files inside untrusted submission trees
//!
//! Submissions have no fixed layout, so every lookup is a full recursive walk.
//! The walk order is made deterministic: inside each directory, files are
//! visited before subdirectories and both are sorted by name, so "first
//! match" is stable across runs and machines.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use crate::error::{GradeError, GradeResult};

/// How a file name is compared against the anchor name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// File name equals the target; the first hit in walk order wins
    #[default]
    Exact,
    /// File name ends with the target; the lexicographically greatest file
    /// name wins, earlier walk position breaking remaining ties
    Suffix,
}

/// The file that identifies a submission's source root or its artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub file: String,
    #[serde(default, rename = "match")]
    pub mode: MatchMode,
}

impl Anchor {
    pub fn exact(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            mode: MatchMode::Exact,
        }
    }

    pub fn suffix(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            mode: MatchMode::Suffix,
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self.mode {
            MatchMode::Exact => name == self.file,
            MatchMode::Suffix => name.ends_with(&self.file),
        }
    }

    /// Find the anchor file under `root`
    pub fn locate(&self, root: impl AsRef<Path>) -> GradeResult<PathBuf> {
        let root = root.as_ref();
        let mut candidates = walk_files(root).filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.matches(name))
        });

        let found = match self.mode {
            MatchMode::Exact => candidates.next(),
            MatchMode::Suffix => candidates.fold(None, |best: Option<DirEntry>, entry| match best {
                Some(current) if entry.file_name() <= current.file_name() => Some(current),
                _ => Some(entry),
            }),
        };

        found
            .map(|entry| entry.into_path())
            .ok_or_else(|| GradeError::not_found(&self.file, root))
    }

    /// Directory holding the anchor file
    pub fn locate_dir(&self, root: impl AsRef<Path>) -> GradeResult<PathBuf> {
        let file = self.locate(root.as_ref())?;
        Ok(file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.as_ref().to_path_buf()))
    }
}

fn walk_files(root: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(root)
        .sort_by(|a, b| match (a.file_type().is_dir(), b.file_type().is_dir()) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            _ => a.file_name().cmp(b.file_name()),
        })
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, relative).unwrap();
    }

    #[test]
    fn test_exact_match_in_nested_tree() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "hw2/code/src/run.sh");
        touch(temp_dir.path(), "hw2/readme.md");

        let found = Anchor::exact("run.sh").locate(temp_dir.path()).unwrap();
        assert_eq!(found, temp_dir.path().join("hw2/code/src/run.sh"));

        let dir = Anchor::exact("run.sh").locate_dir(temp_dir.path()).unwrap();
        assert_eq!(dir, temp_dir.path().join("hw2/code/src"));
    }

    #[test]
    fn test_exact_match_prefers_shallower_files_over_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a/p2_main.py");
        touch(temp_dir.path(), "p2_main.py");

        let found = Anchor::exact("p2_main.py").locate(temp_dir.path()).unwrap();
        assert_eq!(found, temp_dir.path().join("p2_main.py"));
    }

    #[test]
    fn test_exact_match_rejects_suffix_only_names() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "old_run.sh");

        let err = Anchor::exact("run.sh").locate(temp_dir.path()).unwrap_err();
        assert!(matches!(err, GradeError::NotFound { .. }));
    }

    #[test]
    fn test_suffix_match_picks_greatest_file_name() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "z_dir/a_p2_prediction.csv");
        touch(temp_dir.path(), "b_p2_prediction.csv");
        touch(temp_dir.path(), "m/p2_prediction.csv");

        let found = Anchor::suffix("p2_prediction.csv")
            .locate(temp_dir.path())
            .unwrap();
        assert_eq!(found, temp_dir.path().join("m/p2_prediction.csv"));
    }

    #[test]
    fn test_suffix_tie_keeps_first_in_walk_order() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "b/out.csv");
        touch(temp_dir.path(), "a/out.csv");

        let found = Anchor::suffix("out.csv").locate(temp_dir.path()).unwrap();
        assert_eq!(found, temp_dir.path().join("a/out.csv"));
    }

    #[test]
    fn test_missing_target_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "src/main.py");

        let err = Anchor::suffix("p3_prediction.csv")
            .locate(temp_dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("p3_prediction.csv"));
    }
}
