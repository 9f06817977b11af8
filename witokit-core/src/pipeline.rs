//! The commands: fan a task out over the inputs, then merge.
//!
//! Merged runs (`extract`, `process`) follow the same sequence through
//! [`run_batch`]: create the workspace, truncate the final output, dispatch,
//! aggregate in natural order, tear the workspace down. Any failure before the
//! teardown leaves the workspace on disk for inspection, and a later run into
//! the same directory refuses to start until it has been removed.

use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, Instrument};

use crate::aggregate::{aggregate, AggregateReport};
use crate::config::TaskContext;
use crate::contract::{ArticleExtractor, DumpLister, Fetcher, Task, Tokenizer};
use crate::dispatch::{DispatchReport, Dispatcher, FailurePolicy};
use crate::error::PipelineError;
use crate::natsort::natsort_paths;
use crate::progress::ProgressReporter;
use crate::tasks::{DecompressTask, DownloadTask, ExtractTask, TokenizeTask};

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub language: String,
    pub lowercase: bool,
    pub workers: usize,
    pub policy: FailurePolicy,
    pub keep_archives: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            lowercase: false,
            workers: 1,
            policy: FailurePolicy::default(),
            keep_archives: false,
        }
    }
}

impl RunOptions {
    pub fn dispatcher(&self) -> Result<Dispatcher, PipelineError> {
        Ok(Dispatcher::new(self.workers)?.with_policy(self.policy))
    }
}

/// Summary of one command run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub command: &'static str,
    pub language: String,
    pub inputs: usize,
    pub completed: usize,
    /// Inputs dropped after a recoverable failure.
    pub skipped: Vec<String>,
    pub lines_written: u64,
    pub segments_skipped: u64,
    /// Files the run left behind: the merged file, or decompressed dumps.
    pub outputs: Vec<PathBuf>,
    pub merged: Option<AggregateReport>,
}

impl RunReport {
    fn new(ctx: &TaskContext, inputs: usize) -> Self {
        Self {
            run_id: ctx.run_id.to_string(),
            command: ctx.command,
            language: ctx.language.clone(),
            inputs,
            completed: 0,
            skipped: Vec::new(),
            lines_written: 0,
            segments_skipped: 0,
            outputs: Vec::new(),
            merged: None,
        }
    }

    fn absorb(&mut self, batch: &DispatchReport) {
        self.completed += batch.completed.len();
        self.skipped.extend(batch.skipped.iter().map(|s| s.input.clone()));
        for out in &batch.completed {
            self.lines_written += out.lines_written;
            self.segments_skipped += out.segments_skipped;
        }
    }

    fn log(&self) {
        info!(
            command = self.command,
            completed = self.completed,
            skipped = self.skipped.len(),
            lines = self.lines_written,
            "Run finished"
        );
        match serde_json::to_string(self) {
            Ok(json) => debug!(report = %json, "Run report"),
            Err(e) => debug!(error = %e, "Run report not serialisable"),
        }
    }
}

/// Run `task` over `inputs` and merge the per-item outputs into `final_output`.
pub async fn run_batch<T: Task>(
    task: Arc<T>,
    ctx: Arc<TaskContext>,
    inputs: Vec<T::Input>,
    final_output: &Path,
    dispatcher: &Dispatcher,
) -> Result<RunReport, PipelineError> {
    let span = ctx.span.clone();
    merge_run(task, ctx, inputs, final_output, dispatcher)
        .instrument(span)
        .await
}

async fn merge_run<T: Task>(
    task: Arc<T>,
    ctx: Arc<TaskContext>,
    inputs: Vec<T::Input>,
    final_output: &Path,
    dispatcher: &Dispatcher,
) -> Result<RunReport, PipelineError> {
    let workspace = ctx.workspace();
    workspace.create()?;
    let leftovers = workspace.outputs()?;
    if !leftovers.is_empty() {
        error!(
            workspace = %workspace.dir().display(),
            files = leftovers.len(),
            "Workspace holds outputs of an earlier run"
        );
        return Err(PipelineError::Config(format!(
            "workspace {} still holds {} file(s) from an earlier run; inspect and remove it first",
            workspace.dir().display(),
            leftovers.len()
        )));
    }
    File::create(final_output).map_err(|source| {
        error!(error = ?source, path = %final_output.display(), "Cannot create final output");
        PipelineError::Io {
            path: final_output.to_path_buf(),
            source,
        }
    })?;

    let mut report = RunReport::new(&ctx, inputs.len());
    let mut progress = ProgressReporter::new(task.name(), inputs.len());
    let batch = dispatcher
        .dispatch(Arc::clone(&task), Arc::clone(&ctx), inputs, &mut progress)
        .await
        .inspect_err(|e| {
            error!(
                error = %e,
                workspace = %workspace.dir().display(),
                "Run aborted, workspace kept"
            );
        })?;
    report.absorb(&batch);

    let merged = aggregate(&workspace, final_output).inspect_err(|_| {
        error!(workspace = %workspace.dir().display(), "Aggregation failed, workspace kept");
    })?;
    workspace.teardown()?;

    report.merged = Some(merged);
    report.outputs.push(final_output.to_path_buf());
    report.log();
    Ok(report)
}

/// Regular, non-hidden files directly under `input` accepted by `keep`,
/// naturally sorted. A file path is its own single input.
pub fn list_inputs(input: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>, PipelineError> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(PipelineError::Config(format!(
            "input path {} does not exist",
            input.display()
        )));
    }

    let io = |source| PipelineError::Io {
        path: input.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(input).map_err(io)? {
        let path = entry.map_err(io)?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || !path.is_file() || !keep(name) {
            continue;
        }
        files.push(path);
    }
    natsort_paths(&mut files);
    Ok(files)
}

/// Dump shards: anything with `.xml` in its name (plain or compressed).
pub fn xml_inputs(input: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    list_inputs(input, |name| name.contains(".xml"))
}

pub fn text_inputs(input: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    list_inputs(input, |name| name.ends_with(".txt"))
}

/// A single-file input may not double as the final output: truncating the
/// output would destroy it before it is read.
fn reject_input_as_output(input: &Path, final_output: &Path) -> Result<(), PipelineError> {
    if input.is_file() && same_file(input, final_output) {
        error!(path = %input.display(), "Input file is also the final output");
        return Err(PipelineError::Config(format!(
            "input {} is also the final output",
            input.display()
        )));
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// List a dump, download every archive, decompress each one next to itself.
///
/// Returns a report whose `outputs` are the decompressed XML files.
pub async fn download(
    date: &str,
    output_dir: &Path,
    options: &RunOptions,
    lister: &dyn DumpLister,
    fetcher: Arc<dyn Fetcher>,
) -> Result<RunReport, PipelineError> {
    let dispatcher = options.dispatcher()?;
    fs::create_dir_all(output_dir).map_err(|source| PipelineError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let ctx = Arc::new(
        TaskContext::new("download", options.language.clone(), output_dir)
            .with_keep_archives(options.keep_archives),
    );
    ctx.trace_loaded();

    let span = ctx.span.clone();
    fetch_and_decompress(date, ctx, &dispatcher, lister, fetcher)
        .instrument(span)
        .await
}

async fn fetch_and_decompress(
    date: &str,
    ctx: Arc<TaskContext>,
    dispatcher: &Dispatcher,
    lister: &dyn DumpLister,
    fetcher: Arc<dyn Fetcher>,
) -> Result<RunReport, PipelineError> {
    let names = lister.list_archives(&ctx.language, date).await?;
    let mut report = RunReport::new(&ctx, names.len());

    let mut progress = ProgressReporter::new("download", names.len());
    let fetched = dispatcher
        .dispatch(
            Arc::new(DownloadTask::new(fetcher, date)),
            Arc::clone(&ctx),
            names,
            &mut progress,
        )
        .await?;

    let mut archives: Vec<PathBuf> = fetched.completed.iter().map(|o| o.output.clone()).collect();
    natsort_paths(&mut archives);
    let mut progress = ProgressReporter::new("decompress", archives.len());
    let decompressed = dispatcher
        .dispatch(Arc::new(DecompressTask), Arc::clone(&ctx), archives, &mut progress)
        .await?;

    report.absorb(&decompressed);
    report.skipped.extend(fetched.skipped.iter().map(|s| s.input.clone()));
    report.outputs = decompressed.completed.iter().map(|o| o.output.clone()).collect();
    natsort_paths(&mut report.outputs);
    report.log();
    Ok(report)
}

/// Extract and tokenize every dump shard under `input` into `final_output`.
pub async fn extract(
    input: &Path,
    final_output: &Path,
    options: &RunOptions,
    extractor: Arc<dyn ArticleExtractor>,
    tokenizer: Arc<dyn Tokenizer>,
) -> Result<RunReport, PipelineError> {
    let dispatcher = options.dispatcher()?;
    reject_input_as_output(input, final_output)?;
    let inputs = xml_inputs(input)?;
    let ctx = TaskContext::for_final_output("extract", options.language.clone(), final_output)
        .with_lowercase(options.lowercase);
    ctx.trace_loaded();
    run_batch(
        Arc::new(ExtractTask::new(extractor, tokenizer)),
        Arc::new(ctx),
        inputs,
        final_output,
        &dispatcher,
    )
    .await
}

/// Tokenize every `.txt` file under `input` into `final_output`.
pub async fn process(
    input: &Path,
    final_output: &Path,
    options: &RunOptions,
    tokenizer: Arc<dyn Tokenizer>,
) -> Result<RunReport, PipelineError> {
    let dispatcher = options.dispatcher()?;
    reject_input_as_output(input, final_output)?;
    let mut inputs = text_inputs(input)?;
    // the final output may live among the inputs
    inputs.retain(|p| !same_file(p, final_output));
    let ctx = TaskContext::for_final_output("process", options.language.clone(), final_output)
        .with_lowercase(options.lowercase);
    ctx.trace_loaded();
    run_batch(
        Arc::new(TokenizeTask::new(tokenizer)),
        Arc::new(ctx),
        inputs,
        final_output,
        &dispatcher,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn inputs_skip_hidden_files_and_directories() {
        let dir = tempdir().unwrap();
        for name in ["a10.xml", "a2.xml.bz2", "a1.xml", ".a3.xml", "notes.md"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("b.xml")).unwrap();

        let names: Vec<String> = xml_inputs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a1.xml", "a2.xml.bz2", "a10.xml"]);
    }

    #[test]
    fn a_single_file_is_its_own_input() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("corpus.txt");
        fs::write(&file, "x").unwrap();
        assert_eq!(text_inputs(&file).unwrap(), vec![file]);
    }

    #[test]
    fn missing_input_is_rejected_up_front() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            xml_inputs(&dir.path().join("nope")),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn zero_workers_is_rejected_by_options() {
        let options = RunOptions {
            workers: 0,
            ..RunOptions::default()
        };
        assert!(matches!(options.dispatcher(), Err(PipelineError::Config(_))));
    }
}
