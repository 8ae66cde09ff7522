//! Tokenizer and vocabulary builder.
//!
//! Pipeline: UAX#29 word boundaries → lowercase → drop French elided
//! articles (`l'`, `qu'`, …) → strip non-alphanumeric boundary characters
//! → drop tokens shorter than 2 characters → drop stopwords → stem.
//!
//! The output is a [`DocumentVector`] of raw counts. Vectorization is pure:
//! the same text and stopword set always produce the same vector.
//!
//! # Example
//!
//! ```
//! use fiche_core::stopwords::StopwordSet;
//! use fiche_core::vectorize::vectorize;
//!
//! let stop = StopwordSet::from_words(["the"]);
//! let v = vectorize("The cat sees the other cat.", &stop);
//! assert_eq!(v.get("cat"), 2);
//! assert_eq!(v.get("the"), 0);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::stopwords::StopwordSet;

/// Tokens shorter than this (in characters) are discarded.
pub const MIN_TOKEN_CHARS: usize = 2;

/// French articles and pronouns that elide before a vowel.
const ELISIONS: &[&str] = &[
    "l", "d", "j", "m", "n", "s", "t", "c", "qu", "jusqu", "lorsqu", "puisqu", "quoiqu",
];

/// Raw term frequencies of one document, in term order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentVector {
    counts: BTreeMap<String, u32>,
}

impl DocumentVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of `term`, 0 when absent.
    pub fn get(&self, term: &str) -> u32 {
        self.counts.get(term).copied().unwrap_or(0)
    }

    pub fn add(&mut self, term: impl Into<String>, count: u32) {
        if count == 0 {
            return;
        }
        *self.counts.entry(term.into()).or_insert(0) += count;
    }

    /// Iterate `(term, count)` pairs in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(t, c)| (t.as_str(), *c))
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().map(|c| *c as u64).sum()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for DocumentVector {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        let mut v = DocumentVector::new();
        for (term, count) in iter {
            v.add(term, count);
        }
        v
    }
}

/// Pluggable stemming step, applied after stopword filtering.
pub trait Stemmer: Send + Sync {
    fn stem(&self, token: &str) -> String;
}

/// Leaves tokens untouched. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityStemmer;

impl Stemmer for IdentityStemmer {
    fn stem(&self, token: &str) -> String {
        token.to_string()
    }
}

impl<F> Stemmer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn stem(&self, token: &str) -> String {
        self(token)
    }
}

/// Text normalizer and term counter.
#[derive(Clone)]
pub struct Tokenizer {
    stemmer: Arc<dyn Stemmer>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer").finish_non_exhaustive()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            stemmer: Arc::new(IdentityStemmer),
        }
    }

    pub fn with_stemmer(stemmer: impl Stemmer + 'static) -> Self {
        Self {
            stemmer: Arc::new(stemmer),
        }
    }

    /// Surviving terms of `text`, in reading order, duplicates kept.
    pub fn terms(&self, text: &str, stopwords: &StopwordSet) -> Vec<String> {
        text.unicode_words()
            .filter_map(normalize_token)
            .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
            .filter(|t| !stopwords.contains(t))
            .map(|t| self.stemmer.stem(&t))
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Count surviving terms of `text`.
    pub fn vectorize(&self, text: &str, stopwords: &StopwordSet) -> DocumentVector {
        let mut vector = DocumentVector::new();
        for term in self.terms(text, stopwords) {
            vector.add(term, 1);
        }
        vector
    }
}

/// Vectorize with the default (non-stemming) tokenizer.
pub fn vectorize(text: &str, stopwords: &StopwordSet) -> DocumentVector {
    Tokenizer::new().vectorize(text, stopwords)
}

/// Number of words in `text`, before any filtering. Used for token budgets.
pub fn word_count(text: &str) -> usize {
    text.unicode_words().count()
}

fn normalize_token(word: &str) -> Option<String> {
    let lower = word.to_lowercase().replace('\u{2019}', "'");
    let trimmed = strip_elision(&lower).trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn strip_elision(token: &str) -> &str {
    match token.split_once('\'') {
        Some((head, tail)) if !tail.is_empty() && ELISIONS.contains(&head) => tail,
        _ => token,
    }
}
