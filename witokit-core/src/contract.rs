//! Seams between the pipeline and the things it drives.
//!
//! The pipeline itself only knows how to fan work out, account for it and
//! merge the results. Everything domain specific sits behind one of the traits
//! below:
//!
//! - [`Task`]: turns one input into one output file (download, decompress,
//!   extract+tokenize, tokenize).
//! - [`DumpLister`] / [`Fetcher`]: the dump host.
//! - [`ArticleExtractor`]: raw XML shard to article records.
//! - [`Tokenizer`]: raw text to sentences of tokens.
//!
//! Collaborator traits are annotated for `mockall` so tests can script them.

use async_trait::async_trait;
use mockall::automock;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::config::TaskContext;
use crate::error::{ExtractError, FetchError, TaskError, TokenizeError};

/// Identity of a finished task, sent back through the pool.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TaskOutput {
    /// What the task was given (path or archive name), for progress logs.
    pub input: String,
    /// The file the task produced.
    pub output: PathBuf,
    /// Lines written to `output` (zero for binary outputs).
    pub lines_written: u64,
    /// Segments dropped because the tokenizer rejected them.
    pub segments_skipped: u64,
}

/// One unit of work over one input.
///
/// Implementations must be idempotent: running a task twice on the same input
/// overwrites the same output path with the same content. Tasks never share
/// mutable state; each writes to its own path.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    type Input: Clone + Debug + Send + Sync + 'static;

    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// How an input shows up in progress logs and errors.
    fn describe(&self, input: &Self::Input) -> String {
        format!("{input:?}")
    }

    async fn run(&self, ctx: &TaskContext, input: Self::Input) -> Result<TaskOutput, TaskError>;
}

/// Lists the archive names published for a dump.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DumpLister: Send + Sync {
    /// Archive names (hrefs) for `language` at `date` (or "latest").
    async fn list_archives(&self, language: &str, date: &str) -> Result<Vec<String>, FetchError>;
}

/// Fetches one archive of a dump to a local path.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `name` from the dump for `language`/`date` into `dest`.
    /// Returns the number of bytes written.
    async fn fetch(
        &self,
        language: &str,
        date: &str,
        name: &str,
        dest: &Path,
    ) -> Result<u64, FetchError>;
}

/// An article pulled out of a dump shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: String,
    pub title: String,
    /// Plain text, paragraphs separated by newlines.
    pub text: String,
}

/// Finite, single-pass stream of articles.
pub type Articles = Box<dyn Iterator<Item = Result<Article, ExtractError>> + Send>;

/// Produces articles from a raw dump shard.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ArticleExtractor: Send + Sync {
    fn articles(&self, path: &Path) -> Result<Articles, ExtractError>;
}

/// Splits text into sentences of tokens.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Tokenizer: Send + Sync {
    fn sentences(&self, text: &str, language: &str) -> Result<Vec<Vec<String>>, TokenizeError>;
}

/// Why a segment produced no output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Blank,
    Rejected(TokenizeError),
}

/// Result of tokenizing a single text segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Sentences of the segment, one rendered line each.
    Lines(Vec<String>),
    Skipped(SkipReason),
}
