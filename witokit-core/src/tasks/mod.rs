//! The per-item tasks behind each command.

mod decompress;
mod download;
mod extract;
mod tokenize;

pub use decompress::{decompressed_path, DecompressTask};
pub use download::DownloadTask;
pub use extract::ExtractTask;
pub use tokenize::TokenizeTask;

use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

use crate::contract::TaskOutput;
use crate::error::TaskError;

/// Run blocking file work off the async workers, inside the caller's span.
///
/// A panic in `work` is resumed here so the dispatcher sees it as a failed worker.
pub(crate) async fn run_blocking<F>(input: &Path, work: F) -> Result<TaskOutput, TaskError>
where
    F: FnOnce() -> Result<TaskOutput, TaskError> + Send + 'static,
{
    let span = tracing::Span::current();
    match tokio::task::spawn_blocking(move || span.in_scope(work)).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(TaskError::Io {
            path: input.to_path_buf(),
            source: io::Error::other(e.to_string()),
        }),
    }
}

/// Remove a partial output after a recoverable failure, so that aggregation
/// never sees half a shard.
pub(crate) fn discard_partial(output: &Path) {
    if let Err(e) = fs::remove_file(output) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(error = ?e, path = %output.display(), "Failed to remove partial output");
        }
    }
}

pub(crate) fn io_error(path: &Path) -> impl Fn(io::Error) -> TaskError + '_ {
    move |source| TaskError::Io {
        path: path.to_path_buf(),
        source,
    }
}
