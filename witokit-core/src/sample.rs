//! Line sampling of a finished corpus.

use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleConfig {
    /// Share of lines to keep, strictly between 0 and 100.
    pub percent: f64,
    /// Spread the kept lines evenly over the file instead of taking the head.
    pub balance: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleReport {
    pub input_lines: u64,
    pub kept: u64,
    pub output: PathBuf,
}

impl SampleConfig {
    pub fn new(percent: f64, balance: bool) -> Result<Self, PipelineError> {
        let config = Self { percent, balance };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.percent > 0.0 && self.percent < 100.0) {
            return Err(PipelineError::Config(format!(
                "sampling percentage must be strictly between 0 and 100, got {}",
                self.percent
            )));
        }
        Ok(())
    }

    /// Lines kept out of `total`.
    pub fn keep_count(&self, total: u64) -> u64 {
        (total as f64 * self.percent / 100.0).floor() as u64
    }
}

/// `<output_dir>/<input stem>.sample<percent>[.balanced].txt`
pub fn sample_output_path(input: &Path, output_dir: &Path, config: &SampleConfig) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".txt").unwrap_or(&name);
    let balanced = if config.balance { ".balanced" } else { "" };
    output_dir.join(format!("{stem}.sample{}{balanced}.txt", config.percent))
}

fn io_err(path: &Path) -> impl Fn(std::io::Error) -> PipelineError + '_ {
    move |source| {
        error!(error = ?source, path = %path.display(), "Sampling I/O failure");
        PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn open_lines(path: &Path) -> Result<std::io::Lines<BufReader<File>>, PipelineError> {
    Ok(BufReader::new(File::open(path).map_err(io_err(path))?).lines())
}

/// Write a sample of `input` into `output_dir`.
///
/// Reads the input twice (count, then copy) so memory stays flat. Balanced
/// sampling keeps every `round(lines / kept)`-th line starting with the first.
pub fn sample(input: &Path, output_dir: &Path, config: &SampleConfig) -> Result<SampleReport, PipelineError> {
    config.validate()?;

    let mut total = 0u64;
    for line in open_lines(input)? {
        line.map_err(io_err(input))?;
        total += 1;
    }
    let target = config.keep_count(total);
    let step = if config.balance && target > 0 {
        ((total as f64 / target as f64).round() as u64).max(1)
    } else {
        1
    };

    let output = sample_output_path(input, output_dir, config);
    let mut out = BufWriter::new(File::create(&output).map_err(io_err(&output))?);
    let mut kept = 0u64;
    for (idx, line) in open_lines(input)?.enumerate() {
        if kept >= target {
            break;
        }
        let line = line.map_err(io_err(input))?;
        if idx as u64 % step == 0 {
            writeln!(out, "{line}").map_err(io_err(&output))?;
            kept += 1;
        }
    }
    out.flush().map_err(io_err(&output))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        total,
        kept,
        balanced = config.balance,
        "Sampled corpus"
    );
    Ok(SampleReport {
        input_lines: total,
        kept,
        output,
    })
}
