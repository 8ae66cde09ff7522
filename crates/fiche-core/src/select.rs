//! Relevance selection of text spans under a length budget.
//!
//! # Algorithm
//!
//! 1. Score each span: the sum of `weight(document, term)` over the span's
//!    terms, one addition per occurrence.
//! 2. Sort by score (desc), then document order (asc), then position (asc).
//! 3. Take spans in that order while the running cost stays within the
//!    budget. The first span that would overflow ends selection; it is
//!    skipped, never cut mid-sentence.
//! 4. If not even the first span fits, return it alone, truncated at the
//!    last sentence boundary within budget (then word boundary, then a hard
//!    character cut), so non-empty input always yields non-empty output.

use unicode_segmentation::UnicodeSegmentation;

use crate::index::TermWeights;
use crate::stopwords::StopwordSet;
use crate::vectorize::{word_count, Tokenizer};

/// A passage attributable to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub document_id: String,
    /// Rank of the source document within the candidate set.
    pub document_order: usize,
    /// Position of the span within its document.
    pub position: usize,
    pub text: String,
}

/// A selected span with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSpan {
    pub span: Span,
    pub score: f64,
    /// True when the span was cut to fit the budget.
    pub truncated: bool,
}

/// Length limit for a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Unicode scalar values.
    Chars(usize),
    /// Words, as counted by UAX#29 word boundaries.
    Tokens(usize),
}

impl Budget {
    pub fn limit(&self) -> usize {
        match self {
            Budget::Chars(n) | Budget::Tokens(n) => *n,
        }
    }

    /// Cost of `text` in this budget's unit.
    pub fn cost(&self, text: &str) -> usize {
        match self {
            Budget::Chars(_) => text.chars().count(),
            Budget::Tokens(_) => word_count(text),
        }
    }
}

/// Split a document into sentence spans.
///
/// Uses UAX#29 sentence boundaries, which also break on newlines. Pieces
/// without any alphanumeric character are dropped.
pub fn split_sentences(document_id: &str, document_order: usize, text: &str) -> Vec<Span> {
    text.split_sentence_bounds()
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .enumerate()
        .map(|(position, sentence)| Span {
            document_id: document_id.to_string(),
            document_order,
            position,
            text: sentence.to_string(),
        })
        .collect()
}

/// Longest prefix of `text` that fits `budget`, cut at a sentence boundary
/// if possible, then at a word boundary, then at a character.
pub fn truncate_to_budget(text: &str, budget: Budget) -> String {
    if budget.cost(text) <= budget.limit() {
        return text.to_string();
    }

    let fits = |prefix: &str| budget.cost(prefix) <= budget.limit();

    // Sentence bounds keep their trailing whitespace; it does not count.
    let sentence_prefix = text
        .split_sentence_bound_indices()
        .map(|(start, s)| text[..start + s.len()].trim_end())
        .take_while(|prefix| fits(*prefix))
        .last();
    if let Some(prefix) = sentence_prefix {
        let prefix = prefix.trim_start();
        if !prefix.is_empty() {
            return prefix.to_string();
        }
    }

    let word_prefix = text
        .split_word_bound_indices()
        .filter(|(_, w)| w.chars().any(char::is_alphanumeric))
        .map(|(start, w)| &text[..start + w.len()])
        .take_while(|prefix| fits(*prefix))
        .last();
    if let Some(prefix) = word_prefix {
        return prefix.trim().to_string();
    }

    match budget {
        Budget::Chars(n) => text.chars().take(n).collect(),
        Budget::Tokens(_) => String::new(),
    }
}

/// Ranks spans with corpus weights and fills a budget.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceSelector<'a> {
    tokenizer: &'a Tokenizer,
    stopwords: &'a StopwordSet,
}

impl<'a> RelevanceSelector<'a> {
    pub fn new(tokenizer: &'a Tokenizer, stopwords: &'a StopwordSet) -> Self {
        Self {
            tokenizer,
            stopwords,
        }
    }

    /// Score of one span against its document's weights.
    pub fn score<W: TermWeights + ?Sized>(&self, span: &Span, weights: &W) -> f64 {
        self.tokenizer
            .terms(&span.text, self.stopwords)
            .iter()
            .map(|term| weights.term_weight(&span.document_id, term))
            .sum()
    }

    /// Rank all spans, best first, without applying a budget.
    pub fn rank<W: TermWeights + ?Sized>(&self, spans: &[Span], weights: &W) -> Vec<ScoredSpan> {
        let mut scored: Vec<ScoredSpan> = spans
            .iter()
            .map(|span| ScoredSpan {
                score: self.score(span, weights),
                span: span.clone(),
                truncated: false,
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.span.document_order.cmp(&b.span.document_order))
                .then(a.span.position.cmp(&b.span.position))
        });
        scored
    }

    /// Select the best spans within `budget`, in score order.
    ///
    /// Never exceeds the budget; never returns an empty list when `spans`
    /// is non-empty.
    pub fn select<W: TermWeights + ?Sized>(
        &self,
        spans: &[Span],
        weights: &W,
        budget: Budget,
    ) -> Vec<ScoredSpan> {
        let ranked = self.rank(spans, weights);
        let mut selected = Vec::new();
        let mut used = 0usize;

        for candidate in &ranked {
            let cost = budget.cost(&candidate.span.text);
            if used + cost > budget.limit() {
                break;
            }
            used += cost;
            selected.push(candidate.clone());
        }

        if selected.is_empty() {
            if let Some(top) = ranked.into_iter().next() {
                let text = truncate_to_budget(&top.span.text, budget);
                selected.push(ScoredSpan {
                    truncated: text != top.span.text,
                    span: Span { text, ..top.span },
                    score: top.score,
                });
            }
        }

        selected
    }
}
