//! Text metrics derived from post and comment bodies.
//!
//! Pure functions: no I/O, no failure modes. Metrics are always computed
//! from stored text, never scraped.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

lazy_static! {
    static ref LINK_REGEX: Regex = Regex::new(r"https?://[^\s<>()\[\]]+").unwrap();
    static ref ALPHA_WORD_REGEX: Regex = Regex::new(r"^[a-z]+$").unwrap();
}

/// Five fixed metrics computed from a piece of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    /// Whitespace-delimited tokens
    pub word_count: usize,

    /// Length in unicode code points
    pub char_count: usize,

    /// Distinct case-folded, purely alphabetic tokens
    pub unique_words: usize,

    /// Mean token length, rounded to 2 decimals
    pub avg_word_length: f64,

    /// HTTP(S) URLs
    pub link_count: usize,
}

impl TextMetrics {
    /// Compute metrics for a text. Empty input yields all zeros.
    pub fn compute(text: &str) -> Self {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Self {
                char_count: text.chars().count(),
                ..Self::default()
            };
        }

        let mut vocabulary = HashSet::new();
        let mut total_len = 0usize;
        for token in &tokens {
            total_len += token.chars().count();
            let folded = token.to_lowercase();
            if ALPHA_WORD_REGEX.is_match(&folded) {
                vocabulary.insert(folded);
            }
        }

        Self {
            word_count: tokens.len(),
            char_count: text.chars().count(),
            unique_words: vocabulary.len(),
            avg_word_length: round2(total_len as f64 / tokens.len() as f64),
            link_count: LINK_REGEX.find_iter(text).count(),
        }
    }

    /// Metrics for a post: title and content joined.
    pub fn for_post(title: &str, content: Option<&str>) -> Self {
        match content.map(str::trim).filter(|c| !c.is_empty()) {
            Some(body) => Self::compute(&format!("{}\n\n{}", title, body)),
            None => Self::compute(title),
        }
    }

    /// Vocabulary diversity (unique / total words), 0 when empty.
    pub fn lexical_diversity(&self) -> f64 {
        if self.word_count == 0 {
            return 0.0;
        }
        self.unique_words as f64 / self.word_count as f64
    }
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
