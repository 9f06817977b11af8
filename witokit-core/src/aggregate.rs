//! Ordered merge of the workspace into the final output.

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    pub files: usize,
    pub lines: u64,
}

fn io_err(path: &Path) -> impl Fn(std::io::Error) -> PipelineError + '_ {
    move |source| {
        error!(error = ?source, path = %path.display(), "Aggregation I/O failure");
        PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Append every workspace output, in natural order of file names, to
/// `final_output`, one trimmed non-blank line at a time.
///
/// The result depends only on the workspace contents, never on the order in
/// which tasks finished. Memory use is bounded by the longest line.
pub fn aggregate(workspace: &Workspace, final_output: &Path) -> Result<AggregateReport, PipelineError> {
    let outputs = workspace.outputs()?;
    info!(
        files = outputs.len(),
        output = %final_output.display(),
        "Concatenating tmp files"
    );

    let sink = OpenOptions::new()
        .create(true)
        .append(true)
        .open(final_output)
        .map_err(io_err(final_output))?;
    let mut out = BufWriter::new(sink);
    let mut report = AggregateReport::default();

    for path in &outputs {
        let reader = BufReader::new(File::open(path).map_err(io_err(path))?);
        let mut file_lines = 0u64;
        for line in reader.lines() {
            let line = line.map_err(io_err(path))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            writeln!(out, "{line}").map_err(io_err(final_output))?;
            file_lines += 1;
        }
        debug!(path = %path.display(), lines = file_lines, "Merged tmp file");
        report.files += 1;
        report.lines += file_lines;
    }
    out.flush().map_err(io_err(final_output))?;

    info!(files = report.files, lines = report.lines, "Aggregation complete");
    Ok(report)
}
