//! Import matching: does a picked file belong to a book already in the library?
//!
//! Matching runs in two passes. The exact pass compares normalised title and
//! author. The fuzzy pass compares titles with a [`SimilarityMetric`] and
//! keeps the best book scoring at least the merge threshold.

use crate::metadata::extract_metadata;
use narrivo_config::LibraryConfig;
use narrivo_core::{Book, BookId};
use std::collections::HashSet;

/// How a match was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Exact,
    Fuzzy,
    None,
}

/// Outcome of matching one candidate against the library
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched_book_id: Option<BookId>,
    /// Score in `[0, 1]`
    pub confidence: f64,
    pub method: MatchMethod,
    /// A fuzzy match below the confirm threshold; the UI should ask first
    pub needs_confirmation: bool,
}

impl MatchResult {
    fn none() -> Self {
        Self {
            matched_book_id: None,
            confidence: 0.0,
            method: MatchMethod::None,
            needs_confirmation: false,
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched_book_id.is_some()
    }
}

/// Score thresholds used by the fuzzy pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    pub confirm: f64,
    pub merge: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            confirm: 0.9,
            merge: 0.7,
        }
    }
}

impl From<&LibraryConfig> for MatchThresholds {
    fn from(config: &LibraryConfig) -> Self {
        Self {
            confirm: config.confirm_threshold,
            merge: config.merge_threshold,
        }
    }
}

/// A file supplied by the file picker, with metadata inferred from its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub filename: String,
    /// Opaque handle to the content (a local path or URI)
    pub content_handle: String,
    pub inferred_title: String,
    pub inferred_author: String,
}

impl ImportCandidate {
    /// Builds a candidate, inferring title and author from `filename`
    pub fn from_file(filename: impl Into<String>, content_handle: impl Into<String>) -> Self {
        let filename = filename.into();
        let meta = extract_metadata(&filename);
        Self {
            filename,
            content_handle: content_handle.into(),
            inferred_title: meta.title,
            inferred_author: meta.author,
        }
    }
}

/// String similarity in `[0, 1]`
pub trait SimilarityMetric: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Jaccard index over the character sets of the normalised strings
///
/// Cheap and order-insensitive: it ignores token order and length, so
/// anagram-like titles score high. Identical normalised strings always
/// score 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacterJaccard;

impl SimilarityMetric for CharacterJaccard {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = normalize(a);
        let b = normalize(b);
        if a == b {
            return 1.0;
        }

        let set_a: HashSet<char> = a.chars().collect();
        let set_b: HashSet<char> = b.chars().collect();
        let union = set_a.union(&set_b).count();
        if union == 0 {
            return 0.0;
        }
        let intersection = set_a.intersection(&set_b).count();
        intersection as f64 / union as f64
    }
}

/// Lowercases, strips punctuation and collapses whitespace
pub fn normalize(s: &str) -> String {
    let stripped: String = s
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Matches import candidates against existing books
///
/// Pure: never mutates the library and never fails.
#[derive(Debug, Clone)]
pub struct ImportMatcher<M = CharacterJaccard> {
    metric: M,
    thresholds: MatchThresholds,
}

impl ImportMatcher<CharacterJaccard> {
    pub fn new(thresholds: MatchThresholds) -> Self {
        Self::with_metric(CharacterJaccard, thresholds)
    }
}

impl Default for ImportMatcher<CharacterJaccard> {
    fn default() -> Self {
        Self::new(MatchThresholds::default())
    }
}

impl<M: SimilarityMetric> ImportMatcher<M> {
    /// Uses a custom similarity metric for the fuzzy pass
    pub fn with_metric(metric: M, thresholds: MatchThresholds) -> Self {
        Self { metric, thresholds }
    }

    pub fn thresholds(&self) -> MatchThresholds {
        self.thresholds
    }

    /// Finds the book `candidate` belongs to, if any
    pub fn find_match(&self, candidate: &ImportCandidate, books: &[Book]) -> MatchResult {
        let title = normalize(&candidate.inferred_title);
        let author = normalize(&candidate.inferred_author);

        if let Some(book) = books
            .iter()
            .find(|b| normalize(&b.title) == title && normalize(&b.author) == author)
        {
            return MatchResult {
                matched_book_id: Some(book.id.clone()),
                confidence: 1.0,
                method: MatchMethod::Exact,
                needs_confirmation: false,
            };
        }

        let mut best: Option<(&Book, f64)> = None;
        for book in books {
            let score = self
                .metric
                .similarity(&book.title, &candidate.inferred_title);
            if score < self.thresholds.merge {
                continue;
            }
            // Strictly greater: on ties the earliest book wins
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((book, score));
            }
        }

        match best {
            Some((book, score)) => MatchResult {
                matched_book_id: Some(book.id.clone()),
                confidence: score,
                method: MatchMethod::Fuzzy,
                needs_confirmation: score < self.thresholds.confirm,
            },
            None => MatchResult::none(),
        }
    }
}
