use tracing::{error, info, warn};

use crate::contract::TaskOutput;
use crate::error::TaskError;

/// Running tally of a batch, fed completion events in arrival order.
#[derive(Debug)]
pub struct ProgressReporter {
    label: &'static str,
    total: usize,
    completed: usize,
    skipped: usize,
    failed: usize,
}

impl ProgressReporter {
    pub fn new(label: &'static str, total: usize) -> Self {
        info!(label, total, "Starting batch");
        Self {
            label,
            total,
            completed: 0,
            skipped: 0,
            failed: 0,
        }
    }

    pub fn record_completed(&mut self, output: &TaskOutput) {
        self.completed += 1;
        info!(
            label = self.label,
            input = %output.input,
            output = %output.output.display(),
            lines = output.lines_written,
            segments_skipped = output.segments_skipped,
            "Done {} {}",
            self.label,
            output.input
        );
        self.log_count();
    }

    pub fn record_skipped(&mut self, input: &str, err: &TaskError) {
        self.skipped += 1;
        warn!(label = self.label, input, error = %err, "Skipped item");
        self.log_count();
    }

    pub fn record_failed(&mut self, input: &str, err: &TaskError) {
        self.failed += 1;
        error!(label = self.label, input, error = %err, "Item failed");
        self.log_count();
    }

    fn log_count(&self) {
        info!(
            label = self.label,
            done = self.finished(),
            total = self.total,
            "Completed {} of {}/{} items",
            self.label,
            self.finished(),
            self.total
        );
    }

    /// Items accounted for so far, whatever their outcome.
    pub fn finished(&self) -> usize {
        self.completed + self.skipped + self.failed
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn counts_every_outcome() {
        let mut progress = ProgressReporter::new("extract", 3);
        progress.record_completed(&TaskOutput {
            input: "a1.xml".into(),
            output: PathBuf::from("tmp/a1.xml.txt"),
            lines_written: 2,
            segments_skipped: 0,
        });
        progress.record_skipped(
            "a2.xml",
            &TaskError::Malformed {
                path: "a2.xml".into(),
                reason: "eof".into(),
            },
        );
        progress.record_failed(
            "a3.xml",
            &TaskError::Decode {
                path: "a3.xml".into(),
                reason: "crc".into(),
            },
        );
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.skipped(), 1);
        assert_eq!(progress.failed(), 1);
        assert_eq!(progress.finished(), progress.total());
    }
}
