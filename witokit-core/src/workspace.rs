//! The tmp directory holding per-item outputs for one run.
//!
//! Lifecycle: [`Workspace::create`] before any task writes, tasks write to
//! [`Workspace::output_path_for`], the aggregator reads [`Workspace::outputs`],
//! and [`Workspace::teardown`] removes everything once the merge succeeded.
//! Nothing recreates the directory mid-run: if it disappears, listing fails.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::natsort::natsort_paths;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory (and parents). Fine if it already exists.
    pub fn create(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            error!(error = ?e, path = %self.dir.display(), "Failed to create workspace");
            PipelineError::Workspace {
                path: self.dir.clone(),
                source: e,
            }
        })?;
        debug!(path = %self.dir.display(), "Workspace ready");
        Ok(())
    }

    /// `tmp/<input basename>.txt`
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let base = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        self.dir.join(format!("{base}.txt"))
    }

    /// All regular files in the workspace, in natural order of their names.
    pub fn outputs(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                error!(path = %self.dir.display(), "Workspace vanished before aggregation");
                PipelineError::WorkspaceMissing {
                    path: self.dir.clone(),
                }
            } else {
                PipelineError::Workspace {
                    path: self.dir.clone(),
                    source: e,
                }
            }
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::Workspace {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        natsort_paths(&mut files);
        Ok(files)
    }

    /// Remove the directory and everything in it.
    pub fn teardown(self) -> Result<(), PipelineError> {
        fs::remove_dir_all(&self.dir).map_err(|e| {
            error!(error = ?e, path = %self.dir.display(), "Failed to remove workspace");
            PipelineError::Workspace {
                path: self.dir.clone(),
                source: e,
            }
        })?;
        info!(path = %self.dir.display(), "Removed workspace");
        Ok(())
    }
}
