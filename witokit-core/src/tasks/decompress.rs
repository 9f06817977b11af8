use async_trait::async_trait;
use bzip2::read::MultiBzDecoder;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{io_error, run_blocking};
use crate::config::TaskContext;
use crate::contract::{Task, TaskOutput};
use crate::error::TaskError;

/// Decompressed bytes are moved through a buffer of this size.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// `a.xml-p1p2.bz2` -> `a.xml-p1p2`. `None` if the name has no `.bz2` suffix.
pub fn decompressed_path(archive: &Path) -> Option<PathBuf> {
    let name = archive.file_name()?.to_str()?;
    let stem = name.strip_suffix(".bz2")?;
    (!stem.is_empty()).then(|| archive.with_file_name(stem))
}

/// Decompresses one `.bz2` archive next to itself, in bounded memory.
///
/// The archive is deleted afterwards unless the context keeps archives.
#[derive(Debug, Default)]
pub struct DecompressTask;

#[async_trait]
impl Task for DecompressTask {
    type Input = PathBuf;

    fn name(&self) -> &'static str {
        "decompress"
    }

    fn describe(&self, input: &PathBuf) -> String {
        input.display().to_string()
    }

    async fn run(&self, ctx: &TaskContext, archive: PathBuf) -> Result<TaskOutput, TaskError> {
        let Some(output) = decompressed_path(&archive) else {
            return Err(TaskError::Decode {
                path: archive,
                reason: "not a .bz2 archive".into(),
            });
        };
        let keep_archive = ctx.keep_archives;
        let input = archive.clone();
        run_blocking(&archive, move || {
            decompress(&input, &output)?;
            if !keep_archive {
                fs::remove_file(&input).map_err(io_error(&input))?;
                debug!(path = %input.display(), "Removed archive");
            }
            Ok(TaskOutput {
                input: input.display().to_string(),
                output,
                lines_written: 0,
                segments_skipped: 0,
            })
        })
        .await
    }
}

fn decompress(archive: &Path, output: &Path) -> Result<u64, TaskError> {
    let file = File::open(archive).map_err(io_error(archive))?;
    let mut decoder = MultiBzDecoder::new(file);
    let mut out = BufWriter::new(File::create(output).map_err(io_error(output))?);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match decoder.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(TaskError::Decode {
                    path: archive.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };
        out.write_all(&buf[..n]).map_err(io_error(output))?;
        total += n as u64;
    }
    out.flush().map_err(io_error(output))?;
    debug!(archive = %archive.display(), bytes = total, "Decompressed archive");
    Ok(total)
}
