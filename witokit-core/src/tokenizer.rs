use unicode_segmentation::UnicodeSegmentation;

use crate::contract::Tokenizer;
use crate::error::TokenizeError;

/// Rule-based tokenizer on UAX #29 sentence and word boundaries.
///
/// Works for any language written with spaces between words. Punctuation is
/// kept as separate tokens; whitespace is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeTokenizer;

impl UnicodeTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for UnicodeTokenizer {
    fn sentences(&self, text: &str, language: &str) -> Result<Vec<Vec<String>>, TokenizeError> {
        if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
            return Err(TokenizeError::UnsupportedLanguage(language.to_string()));
        }
        if text.trim().is_empty() {
            return Err(TokenizeError::EmptySegment);
        }

        let sentences = text
            .split_sentence_bounds()
            .map(|sentence| {
                sentence
                    .split_word_bounds()
                    .filter(|w| !w.chars().all(char::is_whitespace))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|tokens| !tokens.is_empty())
            .collect();
        Ok(sentences)
    }
}
