//! Extractive summaries.
//!
//! A summary is the highest-weighted sentences of one document, put back in
//! reading order. The character budget is proportional to the document
//! length with a floor (`min_chars`), and the number of sentences is capped.
//! When no sentence can be extracted, the summary falls back to the first
//! 2000 characters of the document.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::index::TermWeights;
use crate::models::{Document, SourceSnapshot, Summary};
use crate::select::{split_sentences, Budget, RelevanceSelector};

const FALLBACK_CHARS: usize = 2000;

fn default_compression_ratio() -> f64 {
    0.3
}

fn default_min_chars() -> usize {
    200
}

fn default_max_sentences() -> usize {
    12
}

/// Summary generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryGenerator {
    #[serde(default = "default_compression_ratio")]
    pub compression_ratio: f64,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,
}

impl Default for SummaryGenerator {
    fn default() -> Self {
        Self {
            compression_ratio: default_compression_ratio(),
            min_chars: default_min_chars(),
            max_sentences: default_max_sentences(),
        }
    }
}

impl SummaryGenerator {
    /// Character budget for a text of `len` characters.
    pub fn budget_for(&self, len: usize) -> usize {
        let proportional = (len as f64 * self.compression_ratio).ceil() as usize;
        proportional.max(self.min_chars)
    }

    /// Summarize `document` using corpus weights. Version 1; the caller
    /// assigns the real version.
    pub fn summarize<W: TermWeights + ?Sized>(
        &self,
        document: &Document,
        selector: &RelevanceSelector<'_>,
        weights: &W,
    ) -> Summary {
        let spans = split_sentences(&document.id, 0, &document.text);
        let budget = self.budget_for(document.text.chars().count());

        let text = if spans.len() <= self.max_sentences
            && document.text.chars().count() <= budget
        {
            document.text.clone()
        } else {
            let mut chosen = selector.select(&spans, weights, Budget::Chars(budget));
            chosen.truncate(self.max_sentences.max(1));
            chosen.sort_by_key(|s| s.span.position);
            chosen
                .into_iter()
                .map(|s| s.span.text)
                .collect::<Vec<_>>()
                .join(" ")
        };
        let text = if text.trim().is_empty() {
            leading_text(&document.text)
        } else {
            text
        };

        Summary {
            document_id: document.id.clone(),
            title: document.title.clone(),
            text,
            version: 1,
            sources: SourceSnapshot::from_documents([document]),
            generated_at: Utc::now(),
        }
    }
}

fn leading_text(text: &str) -> String {
    let head: String = text.chars().take(FALLBACK_CHARS).collect();
    head.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::TfIdfIndex;
    use crate::stopwords::{StopwordRegistry, StopwordSet};
    use crate::vectorize::Tokenizer;

    fn indexed(docs: &[&Document], stop: &StopwordSet) -> TfIdfIndex {
        let tokenizer = Tokenizer::new();
        let mut index = TfIdfIndex::new();
        for d in docs {
            index
                .add_document(&d.id, tokenizer.vectorize(&d.text, stop))
                .unwrap();
        }
        index
    }

    #[test]
    fn test_budget_floor_and_ratio() {
        let g = SummaryGenerator::default();
        assert_eq!(g.budget_for(100), 200);
        assert_eq!(g.budget_for(1000), 300);
        assert_eq!(g.budget_for(1001), 301);
    }

    #[test]
    fn test_short_document_returned_whole() {
        let stop = StopwordRegistry::builtin().resolve(&["en"]);
        let doc = Document::new("d1", "Cats sleep. Dogs bark.", None, None);
        let index = indexed(&[&doc], &stop);
        let tokenizer = Tokenizer::new();
        let selector = RelevanceSelector::new(&tokenizer, &stop);

        let s = SummaryGenerator::default().summarize(&doc, &selector, &index);
        assert_eq!(s.text, "Cats sleep. Dogs bark.");
        assert_eq!(s.version, 1);
        assert_eq!(s.sources.fingerprint_of("d1"), Some(doc.fingerprint.as_str()));
    }

    #[test]
    fn test_selected_sentences_kept_in_reading_order() {
        let stop = StopwordRegistry::builtin().resolve(&["en"]);
        let text = "Filler words appear here. \
                    Photosynthesis converts light. \
                    More filler words appear here. \
                    Chlorophyll absorbs light for photosynthesis.";
        let doc = Document::new("bio", text, None, None);
        let other = Document::new("misc", "Filler words appear here and there.", None, None);
        let index = indexed(&[&doc, &other], &stop);
        let tokenizer = Tokenizer::new();
        let selector = RelevanceSelector::new(&tokenizer, &stop);

        // Budget 80 fits the two photosynthesis sentences (45 + 30 chars).
        let generator = SummaryGenerator {
            compression_ratio: 0.3,
            min_chars: 80,
            max_sentences: 2,
        };
        let s = generator.summarize(&doc, &selector, &index);
        assert_eq!(
            s.text,
            "Photosynthesis converts light. Chlorophyll absorbs light for photosynthesis."
        );
    }

    #[test]
    fn test_sentence_cap() {
        let stop = StopwordSet::empty();
        let text = (0..30)
            .map(|i| format!("Sentence number w{}.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let doc = Document::new("long", &text, None, None);
        let index = indexed(&[&doc], &stop);
        let tokenizer = Tokenizer::new();
        let selector = RelevanceSelector::new(&tokenizer, &stop);

        let generator = SummaryGenerator {
            compression_ratio: 1.0,
            min_chars: 0,
            max_sentences: 5,
        };
        let s = generator.summarize(&doc, &selector, &index);
        assert_eq!(split_sentences("long", 0, &s.text).len(), 5);
    }

    #[test]
    fn test_no_sentences_falls_back_to_leading_text() {
        let stop = StopwordSet::empty();
        let doc = Document::new("noise", "... --- !!!", None, None);
        let index = indexed(&[&doc], &stop);
        let tokenizer = Tokenizer::new();
        let selector = RelevanceSelector::new(&tokenizer, &stop);

        let generator = SummaryGenerator {
            min_chars: 0,
            ..SummaryGenerator::default()
        };
        let s = generator.summarize(&doc, &selector, &index);
        assert_eq!(s.text, "... --- !!!");

        let long = Document::new("dashes", &"-- ".repeat(1000), None, None);
        let index = indexed(&[&long], &stop);
        let s = generator.summarize(&long, &selector, &index);
        assert!(!s.text.is_empty());
        assert!(s.text.chars().count() <= 2000);
    }

    #[test]
    fn test_blank_document_summary_unavailable() {
        let stop = StopwordSet::empty();
        let doc = Document::new("blank", "   ", None, None);
        let index = indexed(&[&doc], &stop);
        let tokenizer = Tokenizer::new();
        let selector = RelevanceSelector::new(&tokenizer, &stop);

        let generator = SummaryGenerator {
            min_chars: 0,
            ..SummaryGenerator::default()
        };
        let s = generator.summarize(&doc, &selector, &index);
        assert!(s.text.is_empty());
        assert!(s.to_markdown().contains("(Summary unavailable)"));
    }
}
