use async_trait::async_trait;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{discard_partial, io_error, run_blocking};
use crate::config::TaskContext;
use crate::contract::{Task, TaskOutput, Tokenizer};
use crate::error::TaskError;
use crate::segment::SentenceWriter;

/// Plain-text file to tokenized sentences in the tmp workspace.
///
/// Each non-blank input line is one segment.
pub struct TokenizeTask {
    tokenizer: Arc<dyn Tokenizer>,
}

impl TokenizeTask {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }
}

#[async_trait]
impl Task for TokenizeTask {
    type Input = PathBuf;

    fn name(&self) -> &'static str {
        "tokenize"
    }

    fn describe(&self, input: &PathBuf) -> String {
        input.display().to_string()
    }

    async fn run(&self, ctx: &TaskContext, input: PathBuf) -> Result<TaskOutput, TaskError> {
        let output = ctx.workspace().output_path_for(&input);
        let tokenizer = Arc::clone(&self.tokenizer);
        let language = ctx.language.clone();
        let lowercase = ctx.lowercase;
        let path = input.clone();
        run_blocking(&input, move || {
            let result = tokenize_file(&*tokenizer, &path, &output, &language, lowercase);
            if matches!(result, Err(TaskError::Malformed { .. })) {
                discard_partial(&output);
            }
            result
        })
        .await
    }
}

fn tokenize_file(
    tokenizer: &dyn Tokenizer,
    input: &Path,
    output: &Path,
    language: &str,
    lowercase: bool,
) -> Result<TaskOutput, TaskError> {
    let reader = BufReader::new(File::open(input).map_err(io_error(input))?);
    let file = File::create(output).map_err(io_error(output))?;
    let mut writer = SentenceWriter::new(BufWriter::new(file), tokenizer, language, lowercase);

    for line in reader.lines() {
        let line = line.map_err(|e| match e.kind() {
            ErrorKind::InvalidData => TaskError::Malformed {
                path: input.to_path_buf(),
                reason: "not valid UTF-8".into(),
            },
            _ => TaskError::Io {
                path: input.to_path_buf(),
                source: e,
            },
        })?;
        writer.write_segment(&line).map_err(io_error(output))?;
    }

    let (lines_written, segments_skipped) = writer.finish().map_err(io_error(output))?;
    Ok(TaskOutput {
        input: input.display().to_string(),
        output: output.to_path_buf(),
        lines_written,
        segments_skipped,
    })
}
