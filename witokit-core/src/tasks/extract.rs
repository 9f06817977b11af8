use async_trait::async_trait;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{discard_partial, io_error, run_blocking};
use crate::config::TaskContext;
use crate::contract::{ArticleExtractor, Task, TaskOutput, Tokenizer};
use crate::error::TaskError;
use crate::segment::SentenceWriter;

/// Dump shard to tokenized sentences, one per line, in the tmp workspace.
///
/// Every paragraph of every article is a segment: the tokenizer may reject a
/// paragraph without losing the rest of the shard.
pub struct ExtractTask {
    extractor: Arc<dyn ArticleExtractor>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl ExtractTask {
    pub fn new(extractor: Arc<dyn ArticleExtractor>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            extractor,
            tokenizer,
        }
    }
}

#[async_trait]
impl Task for ExtractTask {
    type Input = PathBuf;

    fn name(&self) -> &'static str {
        "extract"
    }

    fn describe(&self, input: &PathBuf) -> String {
        input.display().to_string()
    }

    async fn run(&self, ctx: &TaskContext, input: PathBuf) -> Result<TaskOutput, TaskError> {
        let output = ctx.workspace().output_path_for(&input);
        let extractor = Arc::clone(&self.extractor);
        let tokenizer = Arc::clone(&self.tokenizer);
        let language = ctx.language.clone();
        let lowercase = ctx.lowercase;
        let path = input.clone();
        run_blocking(&input, move || {
            let result = extract_shard(&*extractor, &*tokenizer, &path, &output, &language, lowercase);
            if matches!(result, Err(TaskError::Malformed { .. })) {
                discard_partial(&output);
            }
            result
        })
        .await
    }
}

fn extract_shard(
    extractor: &dyn ArticleExtractor,
    tokenizer: &dyn Tokenizer,
    input: &Path,
    output: &Path,
    language: &str,
    lowercase: bool,
) -> Result<TaskOutput, TaskError> {
    let articles = extractor.articles(input)?;
    let file = File::create(output).map_err(io_error(output))?;
    let mut writer = SentenceWriter::new(BufWriter::new(file), tokenizer, language, lowercase);

    for article in articles {
        let article = article?;
        for paragraph in article.text.lines() {
            writer.write_segment(paragraph).map_err(io_error(output))?;
        }
    }

    let (lines_written, segments_skipped) = writer.finish().map_err(io_error(output))?;
    Ok(TaskOutput {
        input: input.display().to_string(),
        output: output.to_path_buf(),
        lines_written,
        segments_skipped,
    })
}
