//! Text segment to output lines.
//!
//! A segment is the smallest unit a tokenizer failure is allowed to take down:
//! a paragraph of an article, or one line of a plain-text input.

use std::io::{self, Write};
use tracing::debug;

use crate::contract::{SegmentOutcome, SkipReason, Tokenizer};

/// Trim every token, optionally lowercase, drop empties, join with single spaces.
///
/// Returns `None` when nothing is left.
pub fn render_sentence<S: AsRef<str>>(tokens: &[S], lowercase: bool) -> Option<String> {
    let mut line = String::new();
    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        if !line.is_empty() {
            line.push(' ');
        }
        if lowercase {
            line.push_str(&token.to_lowercase());
        } else {
            line.push_str(token);
        }
    }
    (!line.is_empty()).then_some(line)
}

/// Tokenize one segment. Tokenizer failures are returned as data.
pub fn tokenize_segment(
    tokenizer: &dyn Tokenizer,
    segment: &str,
    language: &str,
    lowercase: bool,
) -> SegmentOutcome {
    if segment.trim().is_empty() {
        return SegmentOutcome::Skipped(SkipReason::Blank);
    }
    match tokenizer.sentences(segment, language) {
        Ok(sentences) => SegmentOutcome::Lines(
            sentences
                .iter()
                .filter_map(|tokens| render_sentence(tokens, lowercase))
                .collect(),
        ),
        Err(e) => SegmentOutcome::Skipped(SkipReason::Rejected(e)),
    }
}

/// Writes the sentences of successive segments, one per line.
pub struct SentenceWriter<'a, W: Write> {
    out: W,
    tokenizer: &'a dyn Tokenizer,
    language: &'a str,
    lowercase: bool,
    lines: u64,
    skipped: u64,
}

impl<'a, W: Write> SentenceWriter<'a, W> {
    pub fn new(out: W, tokenizer: &'a dyn Tokenizer, language: &'a str, lowercase: bool) -> Self {
        Self {
            out,
            tokenizer,
            language,
            lowercase,
            lines: 0,
            skipped: 0,
        }
    }

    /// Only I/O errors on the sink escape; rejected segments are counted.
    pub fn write_segment(&mut self, segment: &str) -> io::Result<()> {
        match tokenize_segment(self.tokenizer, segment, self.language, self.lowercase) {
            SegmentOutcome::Lines(lines) => {
                for line in lines {
                    writeln!(self.out, "{line}")?;
                    self.lines += 1;
                }
            }
            SegmentOutcome::Skipped(SkipReason::Blank) => {}
            SegmentOutcome::Skipped(SkipReason::Rejected(e)) => {
                self.skipped += 1;
                debug!(error = %e, chars = segment.len(), "Dropped segment");
            }
        }
        Ok(())
    }

    /// Flush and return `(lines written, segments skipped)`.
    pub fn finish(mut self) -> io::Result<(u64, u64)> {
        self.out.flush()?;
        Ok((self.lines, self.skipped))
    }
}
