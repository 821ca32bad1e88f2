//! Reusable sandbox directory for staging submissions
//!
//! One sandbox path is reused for every submission of a batch. Each cycle
//! wipes it, copies the submission's source tree in, then injects fixed
//! reference files (test drivers, datasets) on top.
//!
//! A `Sandbox` holds no lock on its path. Two batches pointed at the same
//! sandbox directory will corrupt each other's working trees; give concurrent
//! runs distinct paths.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{GradeError, GradeResult};

/// A reference file or directory copied into the sandbox after initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// File or directory on the grading host
    pub source: PathBuf,
    /// Destination relative to the sandbox root
    pub dest: String,
}

impl Fixture {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }
}

/// Reusable working directory exclusively owned by the current grading cycle
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Use `path` as the sandbox root. Nothing is touched until `initialize`.
    pub fn at_path(path: impl AsRef<Path>) -> Self {
        Self {
            root: path.as_ref().to_path_buf(),
        }
    }

    /// Get the root path of the sandbox
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destroy the current contents and replace them with a full copy of
    /// `source`. Afterwards the sandbox holds exactly the source tree.
    pub fn initialize(&self, source: impl AsRef<Path>) -> GradeResult<()> {
        let source = source.as_ref();
        if !source.is_dir() {
            return Err(GradeError::io(source, "source tree is not a readable directory"));
        }
        if let (Ok(src), Ok(dst)) = (source.canonicalize(), self.root.canonicalize()) {
            if dst.starts_with(&src) || src.starts_with(&dst) {
                return Err(GradeError::io(
                    &self.root,
                    format!("sandbox and source tree {} overlap", source.display()),
                ));
            }
        }

        self.clear()?;
        copy_tree(source, &self.root)?;

        tracing::info!(
            "Initialized sandbox {} with {}",
            self.root.display(),
            source.display()
        );
        Ok(())
    }

    /// Remove everything under the sandbox root and recreate it empty
    pub fn clear(&self) -> GradeResult<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root).map_err(|e| GradeError::io(&self.root, e))?;
        }
        std::fs::create_dir_all(&self.root).map_err(|e| GradeError::io(&self.root, e))
    }

    /// Copy reference files into the sandbox, replacing whatever the
    /// submission put at the same paths.
    pub fn inject(&self, fixtures: &[Fixture]) -> GradeResult<()> {
        for fixture in fixtures {
            if fixture.source.is_dir() {
                self.overwrite_dir(&fixture.source, &fixture.dest)?;
            } else {
                self.overwrite_file(&fixture.source, &fixture.dest)?;
            }
        }
        Ok(())
    }

    /// Copy a single file to `dest` inside the sandbox
    pub fn overwrite_file(&self, source: impl AsRef<Path>, dest: &str) -> GradeResult<()> {
        let source = source.as_ref();
        let target = self.resolve(dest)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GradeError::io(parent, e))?;
        }
        if target.is_dir() {
            std::fs::remove_dir_all(&target).map_err(|e| GradeError::io(&target, e))?;
        }
        std::fs::copy(source, &target).map_err(|e| GradeError::io(source, e))?;
        tracing::debug!("Injected {} -> {}", source.display(), target.display());
        Ok(())
    }

    /// Replace directory `dest` inside the sandbox with a copy of `source`
    pub fn overwrite_dir(&self, source: impl AsRef<Path>, dest: &str) -> GradeResult<()> {
        let source = source.as_ref();
        let target = self.resolve(dest)?;
        if target.is_dir() {
            std::fs::remove_dir_all(&target).map_err(|e| GradeError::io(&target, e))?;
        } else if target.exists() {
            std::fs::remove_file(&target).map_err(|e| GradeError::io(&target, e))?;
        }
        copy_tree(source, &target)?;
        tracing::debug!("Injected {} -> {}", source.display(), target.display());
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn read_file(&self, path: &str) -> GradeResult<String> {
        let full_path = self.resolve(path)?;
        std::fs::read_to_string(&full_path).map_err(|e| GradeError::io(&full_path, e))
    }

    #[cfg(test)]
    pub(crate) fn file_exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.exists())
    }

    /// List all files in the sandbox, relative to its root, sorted
    pub fn list_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .filter_map(|e| e.path().strip_prefix(&self.root).ok().map(Path::to_path_buf))
            .collect();
        files.sort();
        files
    }

    fn resolve(&self, relative: &str) -> GradeResult<PathBuf> {
        let rel_path = Path::new(relative);

        if rel_path.is_absolute() {
            return Err(GradeError::Config(format!(
                "Absolute sandbox paths are not allowed: {}",
                relative
            )));
        }

        if rel_path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(GradeError::Config(format!(
                "Path traversal is not allowed: {}",
                relative
            )));
        }

        Ok(self.root.join(rel_path))
    }
}

/// Recursively copy `source` to `dest`, following symlinks like a plain
/// directory copy would.
fn copy_tree(source: &Path, dest: &Path) -> GradeResult<()> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            GradeError::io(path, e)
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| GradeError::io(entry.path(), e))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| GradeError::io(&target, e))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| GradeError::io(entry.path(), e))?;
        }
    }
    Ok(())
}
