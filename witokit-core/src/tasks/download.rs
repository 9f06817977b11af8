use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::TaskContext;
use crate::contract::{Fetcher, Task, TaskOutput};
use crate::error::TaskError;

/// Fetches one archive of a dump into the download directory.
///
/// The local file is named after the archive, so re-running overwrites it.
pub struct DownloadTask {
    fetcher: Arc<dyn Fetcher>,
    date: String,
}

impl DownloadTask {
    pub fn new(fetcher: Arc<dyn Fetcher>, date: impl Into<String>) -> Self {
        Self {
            fetcher,
            date: date.into(),
        }
    }
}

#[async_trait]
impl Task for DownloadTask {
    type Input = String;

    fn name(&self) -> &'static str {
        "download"
    }

    fn describe(&self, input: &String) -> String {
        input.clone()
    }

    async fn run(&self, ctx: &TaskContext, name: String) -> Result<TaskOutput, TaskError> {
        let dest = ctx.output_dir.join(&name);
        let bytes = self
            .fetcher
            .fetch(&ctx.language, &self.date, &name, &dest)
            .await?;
        debug!(archive = %name, bytes, "Archive on disk");
        Ok(TaskOutput {
            input: name,
            output: dest,
            lines_written: 0,
            segments_skipped: 0,
        })
    }
}
