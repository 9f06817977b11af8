use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::workspace::Workspace;

/// Host serving the Wikimedia dumps.
pub const DEFAULT_DUMP_URL: &str = "https://dumps.wikimedia.org";

/// Read-only configuration shared by every task of a run.
///
/// Built once per command and handed to each task by reference; nothing in the
/// core looks configuration or logging state up globally. The `span` is the
/// logging sink for the run: tasks instrument their work with it so every event
/// carries the run id.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// The command this run belongs to (`download`, `extract`, `process`).
    pub command: &'static str,
    pub language: String,
    pub lowercase: bool,
    /// Where downloads land, and the parent of the tmp workspace.
    pub output_dir: PathBuf,
    /// Keep `.bz2` archives after decompression.
    pub keep_archives: bool,
    pub run_id: Uuid,
    pub span: tracing::Span,
}

impl TaskContext {
    pub fn new(command: &'static str, language: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        let run_id = Uuid::new_v4();
        let language = language.into();
        let span = tracing::info_span!("run", %run_id, command, language = %language);
        Self {
            command,
            language,
            lowercase: false,
            output_dir: output_dir.into(),
            keep_archives: false,
            run_id,
            span,
        }
    }

    /// Context for a run whose merged result is written to `final_output`.
    pub fn for_final_output(command: &'static str, language: impl Into<String>, final_output: &Path) -> Self {
        Self::new(command, language, output_parent(final_output))
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn with_keep_archives(mut self, keep: bool) -> Self {
        self.keep_archives = keep;
        self
    }

    /// The tmp workspace holding per-item outputs.
    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.output_dir.join("tmp"))
    }

    pub fn trace_loaded(&self) {
        info!(
            run_id = %self.run_id,
            command = self.command,
            language = %self.language,
            lowercase = self.lowercase,
            output_dir = %self.output_dir.display(),
            "Loaded task context"
        );
        debug!(?self, "Task context (full debug)");
    }
}

/// Directory containing `path`, `.` for bare file names.
pub fn output_parent(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_sits_next_to_final_output() {
        let ctx = TaskContext::for_final_output("extract", "en", Path::new("/data/out/enwiki.txt"));
        assert_eq!(ctx.output_dir, PathBuf::from("/data/out"));
        assert_eq!(ctx.workspace().dir(), Path::new("/data/out/tmp"));
    }

    #[test]
    fn bare_file_name_uses_current_dir() {
        assert_eq!(output_parent(Path::new("enwiki.txt")), PathBuf::from("."));
    }

    #[test]
    fn each_context_gets_its_own_run_id() {
        let a = TaskContext::new("download", "en", "/tmp/a");
        let b = TaskContext::new("download", "en", "/tmp/a");
        assert_ne!(a.run_id, b.run_id);
    }
}
