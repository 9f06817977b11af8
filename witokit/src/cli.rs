/// # witokit CLI Interface (Module)
///
/// Command parsing and routing for the `witokit` binary. Every subcommand maps
/// onto one operation of [`witokit_core::pipeline`] or [`witokit_core::sample`];
/// nothing here touches dump files directly.
///
/// - [`Cli`] holds the global `--config` option and the subcommand.
/// - [`run`] is the async entrypoint used by `main` and by integration tests.
///
/// Each command prints its report as JSON on stdout. Fatal errors come back as
/// `anyhow::Error` with the failing file or URL in the message; `main` turns them into a non-zero exit status.
use crate::load_config::{load_optional_config, Overrides};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use witokit_core::pipeline::{download, extract, process};
use witokit_core::sample::{sample, SampleConfig};
use witokit_core::tokenizer::UnicodeTokenizer;
use witokit_core::wiki::{HttpDumpClient, WikiXmlExtractor};

/// Generate a tokenized, one-sentence-per-line dump of Wikipedia.
#[derive(Parser, Debug)]
#[clap(
    name = "witokit",
    version,
    about = "Download, extract and tokenize Wikipedia dumps into a one-sentence-per-line corpus"
)]
pub struct Cli {
    /// Optional YAML file with defaults (dump_url, num_threads, language, lowercase, keep_archives, strict)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download and decompress the pages-articles archives of a Wikipedia dump
    Download {
        /// Wikipedia language code, e.g. en, fr, it
        #[clap(short, long)]
        lang: Option<String>,
        /// Dump date (YYYYMMDD) or "latest"
        #[clap(short, long, default_value = "latest")]
        date: String,
        /// Directory receiving the decompressed XML files
        #[clap(short, long)]
        output: PathBuf,
        /// Number of parallel downloads/decompressions
        #[clap(short, long)]
        num_threads: Option<usize>,
        /// Keep the .bz2 archives after decompression
        #[clap(long)]
        keep_archives: bool,
    },
    /// Extract and tokenize the articles of a directory of XML dump files into one file
    Extract {
        /// Directory of XML dump files (or a single file)
        #[clap(short, long)]
        input: PathBuf,
        /// Final output file; per-file results are staged in a tmp/ directory next to it
        #[clap(short, long)]
        output: PathBuf,
        #[clap(short, long)]
        lang: Option<String>,
        /// Lowercase every token
        #[clap(long)]
        lower: bool,
        /// Keep the original case, even if the config file asks for lowercase
        #[clap(long, conflicts_with = "lower")]
        no_lower: bool,
        #[clap(short, long)]
        num_threads: Option<usize>,
    },
    /// Tokenize a directory of plain-text files into one file
    Process {
        /// Directory of .txt files (or a single file)
        #[clap(short, long)]
        input: PathBuf,
        #[clap(short, long)]
        output: PathBuf,
        #[clap(short, long)]
        lang: Option<String>,
        #[clap(long)]
        lower: bool,
        #[clap(long, conflicts_with = "lower")]
        no_lower: bool,
        #[clap(short, long)]
        num_threads: Option<usize>,
    },
    /// Sample a percentage of the lines of a corpus file
    Sample {
        #[clap(short, long)]
        input: PathBuf,
        /// Directory receiving the sample file
        #[clap(short, long)]
        outdir: PathBuf,
        /// Percentage of lines to keep, strictly between 0 and 100
        #[clap(short, long)]
        percent: f64,
        /// Spread the sample evenly over the whole file
        #[clap(short, long)]
        balance: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_optional_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Download {
            lang,
            date,
            output,
            num_threads,
            keep_archives,
        } => {
            let options = config.run_options(Overrides {
                language: lang,
                num_threads,
                lowercase: None,
                keep_archives,
            })?;
            let client = Arc::new(HttpDumpClient::new(config.dump_url()));
            tracing::info!(
                command = "download",
                dump_url = client.base_url(),
                language = %options.language,
                date = %date,
                "Starting download"
            );
            let report = download(&date, &output, &options, &*client, client.clone())
                .await
                .with_context(|| format!("download of {}wiki/{} failed", options.language, date))?;
            tracing::info!(
                command = "download",
                files = report.outputs.len(),
                output = %output.display(),
                "Download complete"
            );
            print_summary(&report)?;
        }
        Commands::Extract {
            input,
            output,
            lang,
            lower,
            no_lower,
            num_threads,
        } => {
            let options = config.run_options(Overrides {
                language: lang,
                num_threads,
                lowercase: case_flag(lower, no_lower),
                keep_archives: false,
            })?;
            ensure_exists(&input)?;
            let report = extract(
                &input,
                &output,
                &options,
                Arc::new(WikiXmlExtractor::new()),
                Arc::new(UnicodeTokenizer),
            )
            .await
            .with_context(|| format!("extraction of {} failed", input.display()))?;
            tracing::info!(
                command = "extract",
                lines = report.lines_written,
                skipped = report.skipped.len(),
                output = %output.display(),
                "Extraction complete"
            );
            print_summary(&report)?;
        }
        Commands::Process {
            input,
            output,
            lang,
            lower,
            no_lower,
            num_threads,
        } => {
            let options = config.run_options(Overrides {
                language: lang,
                num_threads,
                lowercase: case_flag(lower, no_lower),
                keep_archives: false,
            })?;
            ensure_exists(&input)?;
            let report = process(&input, &output, &options, Arc::new(UnicodeTokenizer))
                .await
                .with_context(|| format!("processing of {} failed", input.display()))?;
            tracing::info!(
                command = "process",
                lines = report.lines_written,
                skipped = report.skipped.len(),
                output = %output.display(),
                "Processing complete"
            );
            print_summary(&report)?;
        }
        Commands::Sample {
            input,
            outdir,
            percent,
            balance,
        } => {
            let sample_config = SampleConfig::new(percent, balance)?;
            if !input.is_file() {
                bail!("input file {} does not exist", input.display());
            }
            std::fs::create_dir_all(&outdir)
                .with_context(|| format!("cannot create {}", outdir.display()))?;
            let report = tokio::task::spawn_blocking(move || sample(&input, &outdir, &sample_config))
                .await??;
            tracing::info!(
                command = "sample",
                kept = report.kept,
                output = %report.output.display(),
                "Sampling complete"
            );
            print_summary(&report)?;
        }
    }

    Ok(())
}

/// `--lower` / `--no-lower`; neither leaves the config file in charge.
fn case_flag(lower: bool, no_lower: bool) -> Option<bool> {
    match (lower, no_lower) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Machine-readable summary of the run on stdout; logs go to stderr.
fn print_summary<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn ensure_exists(input: &std::path::Path) -> Result<()> {
    if !input.exists() {
        tracing::error!(path = %input.display(), "Input path does not exist");
        bail!("input path {} does not exist", input.display());
    }
    Ok(())
}
