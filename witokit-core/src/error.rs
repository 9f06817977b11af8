//! Error taxonomy for the witokit pipeline.
//!
//! Errors are split by blast radius:
//! - [`TokenizeError`] never leaves a task: it becomes a skipped segment.
//! - [`TaskError`] crosses the worker boundary; [`TaskError::is_fatal`] tells the
//!   dispatcher whether to keep going or stop the run.
//! - [`PipelineError`] is what a command returns to its caller.

use std::path::PathBuf;
use thiserror::Error;

/// Transport-level failure while listing or fetching dump archives.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no dump archives found at {url}")]
    NoArchives { url: String },
}

/// Failure of the article extraction collaborator.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML in {path}: {reason}")]
    Xml { path: PathBuf, reason: String },
}

/// Failure of the tokenization collaborator on a single text segment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("segment is empty")]
    EmptySegment,

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("tokenizer backend error: {0}")]
    Backend(String),
}

/// Failure of a single task on a single input.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("corrupt archive {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl TaskError {
    /// Whether this failure must halt the whole run. Only malformed input is
    /// recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TaskError::Malformed { .. })
    }
}

impl From<ExtractError> for TaskError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::Io { path, source } => TaskError::Io { path, source },
            ExtractError::Xml { path, reason } => TaskError::Malformed { path, reason },
        }
    }
}

/// Error returned by a pipeline command.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("workspace error on {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workspace {path} disappeared during the run")]
    WorkspaceMissing { path: PathBuf },

    #[error("{task} failed on {input}: {source}")]
    Task {
        task: &'static str,
        input: String,
        #[source]
        source: TaskError,
    },

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<FetchError> for PipelineError {
    fn from(e: FetchError) -> Self {
        PipelineError::Task {
            task: "list",
            input: match &e {
                FetchError::Transport { url, .. }
                | FetchError::Status { url, .. }
                | FetchError::NoArchives { url } => url.clone(),
                FetchError::Io { path, .. } => path.display().to_string(),
            },
            source: TaskError::Fetch(e),
        }
    }
}
