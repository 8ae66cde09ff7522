//! Four-section revision cards.
//!
//! A card is built from one relevance selection over the sentences of every
//! document in a group. Selected spans are then classified, in rank order,
//! into the fixed sections:
//!
//! | Section        | Cue                                              |
//! |----------------|--------------------------------------------------|
//! | Key concepts   | none (default when no earlier section is empty)  |
//! | Definitions    | "is a", "refers to", "est un", "désigne", …      |
//! | Examples       | "for example", "e.g.", "par exemple", …          |
//! | Open questions | the sentence ends with `?`                       |
//!
//! An un-cued span goes to the first empty section so a small group still
//! spreads over the card. Each section has its own character budget; a
//! span whose section is full moves to the next section with room, and is
//! dropped when there is none. A sentence longer than a whole section is
//! skipped, unless nothing else made it onto the card: then it is cut at a
//! word boundary and ends with `…`. The four sections always exist.
//!
//! Lines that cite a year or a DOI are collected separately as the card's
//! references.

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};
use crate::index::TermWeights;
use crate::models::{CardSection, Document, RevisionCard, SectionKind, SourceSnapshot};
use crate::select::{split_sentences, truncate_to_budget, Budget, RelevanceSelector};

const DEFINITION_CUES: &[&str] = &[
    "is a",
    "is an",
    "is the",
    "refers to",
    "is defined as",
    "means",
    "est un",
    "est une",
    "désigne",
    "se définit",
    "on appelle",
];

const EXAMPLE_CUES: &[&str] = &[
    "for example",
    "for instance",
    "e.g.",
    "such as",
    "par exemple",
    "notamment",
    "tel que",
    "telle que",
];

/// A 20th or 21st century year anywhere in a line.
const YEAR_PATTERN: &str = r"(19|20)\d{2}";
const REFERENCE_MIN_CHARS: usize = 40;
const REFERENCE_MAX_CHARS: usize = 160;
const MAX_REFERENCES: usize = 6;

fn default_section_budget_chars() -> usize {
    600
}

fn default_max_group_docs() -> usize {
    8
}

/// Revision card parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionCardBuilder {
    /// Character budget of each section.
    #[serde(default = "default_section_budget_chars")]
    pub section_budget_chars: usize,
    /// Most documents a theme group resolves to.
    #[serde(default = "default_max_group_docs")]
    pub max_group_docs: usize,
}

impl Default for RevisionCardBuilder {
    fn default() -> Self {
        Self {
            section_budget_chars: default_section_budget_chars(),
            max_group_docs: default_max_group_docs(),
        }
    }
}

/// Section a sentence's wording points to, if any.
pub fn classify(text: &str) -> Option<SectionKind> {
    if text.trim_end().ends_with('?') {
        return Some(SectionKind::OpenQuestions);
    }
    let normalized = format!(" {} ", normalize_for_cues(text));
    let has = |cues: &[&str]| cues.iter().any(|c| normalized.contains(&format!(" {} ", c)));
    if has(DEFINITION_CUES) {
        Some(SectionKind::Definitions)
    } else if has(EXAMPLE_CUES) {
        Some(SectionKind::Examples)
    } else {
        None
    }
}

/// Lowercase, turn punctuation other than `.` and `'` into spaces, and
/// collapse whitespace.
fn normalize_for_cues(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Put `text` in its section, or the next one with room. Dropped when
/// every section is full.
fn place(sections: &mut [CardSection; 4], used: &mut [usize; 4], text: String, limit: usize) {
    let cost = text.chars().count();
    let target = classify(&text).unwrap_or_else(|| {
        sections
            .iter()
            .find(|s| s.is_empty())
            .map(|s| s.kind)
            .unwrap_or(SectionKind::KeyConcepts)
    });
    let placed = std::iter::once(target)
        .chain(SectionKind::ALL.into_iter().filter(|k| *k != target))
        .find(|k| used[k.index()] + cost <= limit);
    if let Some(kind) = placed {
        used[kind.index()] += cost;
        sections[kind.index()].entries.push(text);
    }
}

/// Cut a sentence longer than a section to `limit` characters, marking the
/// cut with an ellipsis.
fn shorten(text: &str, limit: usize) -> Option<String> {
    if limit < 2 {
        return None;
    }
    let cut = truncate_to_budget(text, Budget::Chars(limit - 1));
    if cut.is_empty() {
        None
    } else if cut.ends_with(['.', '!', '?']) {
        Some(cut)
    } else {
        Some(format!("{}…", cut))
    }
}

/// Lines of the group's documents that look like citations: at least 40
/// characters and carrying a year or a DOI. Each is cut to its first
/// citing sentence (two at most) and 160 characters; duplicates are
/// dropped and at most six are kept, in document order.
pub fn extract_references(documents: &[&Document]) -> Result<Vec<String>> {
    let year = Regex::new(YEAR_PATTERN).map_err(|e| Error::RegenerationFailure(e.to_string()))?;
    let cites = |s: &str| year.is_match(s) || s.to_lowercase().contains("doi");

    let mut references: Vec<String> = Vec::new();
    for doc in documents {
        for line in doc.text.split(['\n', '\r']).map(str::trim) {
            if line.chars().count() < REFERENCE_MIN_CHARS || !cites(line) {
                continue;
            }
            let mut parts = Vec::new();
            for sentence in line.split_sentence_bounds().map(str::trim) {
                if sentence.is_empty() {
                    continue;
                }
                parts.push(sentence);
                if cites(parts.join(" ").as_str()) || parts.len() > 1 {
                    break;
                }
            }
            let snippet = clip(&parts.join(" "), REFERENCE_MAX_CHARS);
            if !references.contains(&snippet) {
                references.push(snippet);
            }
            if references.len() == MAX_REFERENCES {
                return Ok(references);
            }
        }
    }
    Ok(references)
}

/// First `max` characters of `text`, backed off to the last space and
/// followed by `…`, when `text` is longer.
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    let head = head.rsplit_once(' ').map_or(head.as_str(), |(h, _)| h);
    format!("{}…", head)
}

impl RevisionCardBuilder {
    /// Budget of the single selection feeding all four sections.
    pub fn selection_budget(&self) -> Budget {
        Budget::Chars(self.section_budget_chars * SectionKind::ALL.len())
    }

    /// Build a card for `documents`, given in group order.
    ///
    /// Fails with `RegenerationFailure` when the group has no documents.
    pub fn build<W: TermWeights + ?Sized>(
        &self,
        name: &str,
        documents: &[&Document],
        selector: &RelevanceSelector<'_>,
        weights: &W,
    ) -> Result<RevisionCard> {
        if documents.is_empty() {
            return Err(Error::RegenerationFailure(format!(
                "group '{}' has no documents",
                name
            )));
        }

        let spans: Vec<_> = documents
            .iter()
            .enumerate()
            .flat_map(|(order, doc)| split_sentences(&doc.id, order, &doc.text))
            .collect();
        let selected = selector.select(&spans, weights, self.selection_budget());

        let mut sections = SectionKind::ALL.map(CardSection::empty);
        let mut used = [0usize; 4];
        let limit = self.section_budget_chars;
        let mut oversized = None;

        for scored in selected {
            let text = scored.span.text;
            if text.chars().count() > limit {
                oversized.get_or_insert(text);
                continue;
            }
            place(&mut sections, &mut used, text, limit);
        }

        if sections.iter().all(CardSection::is_empty) {
            if let Some(text) = oversized.and_then(|t| shorten(&t, limit)) {
                place(&mut sections, &mut used, text, limit);
            }
        }

        Ok(RevisionCard {
            name: name.to_string(),
            sources: SourceSnapshot::from_documents(documents.iter().copied()),
            sections,
            references: extract_references(documents)?,
            version: 1,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::TfIdfIndex;
    use crate::stopwords::StopwordRegistry;
    use crate::vectorize::Tokenizer;

    fn build(builder: &RevisionCardBuilder, docs: &[&Document]) -> Result<RevisionCard> {
        let stop = StopwordRegistry::builtin().resolve(&["en", "fr"]);
        let tokenizer = Tokenizer::new();
        let mut index = TfIdfIndex::new();
        for d in docs {
            index
                .add_document(&d.id, tokenizer.vectorize(&d.text, &stop))
                .unwrap();
        }
        let selector = RelevanceSelector::new(&tokenizer, &stop);
        builder.build("revision", docs, &selector, &index)
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("What drives plate tectonics?"),
            Some(SectionKind::OpenQuestions)
        );
        assert_eq!(
            classify("A tectonic plate is a slab of lithosphere."),
            Some(SectionKind::Definitions)
        );
        assert_eq!(
            classify("La lithosphère désigne l'enveloppe rigide."),
            Some(SectionKind::Definitions)
        );
        assert_eq!(
            classify("Volcanoes, for example, form at boundaries."),
            Some(SectionKind::Examples)
        );
        assert_eq!(
            classify("Par exemple, l'Islande est sur une dorsale."),
            Some(SectionKind::Examples)
        );
        assert_eq!(classify("Plates move slowly."), None);
        // "isa" is not the cue "is a".
        assert_eq!(classify("Thisa isa test."), None);
    }

    #[test]
    fn test_two_spans_four_sections() {
        let doc = Document::new("geo", "Plates move slowly. Mountains rise over time.", None, None);
        let card = build(&RevisionCardBuilder::default(), &[&doc]).unwrap();

        assert_eq!(card.sections.len(), 4);
        assert_eq!(card.populated_sections(), 2);
        assert!(!card.section(SectionKind::KeyConcepts).is_empty());
        assert!(!card.section(SectionKind::Definitions).is_empty());
        assert!(card.section(SectionKind::Examples).is_empty());
        assert!(card.section(SectionKind::OpenQuestions).is_empty());

        let md = card.to_markdown();
        assert!(md.contains("## 3. Examples\n- (none)"));
        assert!(md.contains("## 4. Open questions\n- (none)"));
    }

    #[test]
    fn test_cued_spans_land_in_their_section() {
        let doc = Document::new(
            "geo",
            "Subduction is a process where one plate sinks. \
             Japan, for example, sits on a subduction zone. \
             Why do some plates sink faster?",
            None,
            None,
        );
        let card = build(&RevisionCardBuilder::default(), &[&doc]).unwrap();
        assert_eq!(card.section(SectionKind::Definitions).entries.len(), 1);
        assert_eq!(card.section(SectionKind::Examples).entries.len(), 1);
        assert_eq!(card.section(SectionKind::OpenQuestions).entries.len(), 1);
        assert!(card.section(SectionKind::KeyConcepts).is_empty());
    }

    #[test]
    fn test_full_section_overflows_to_next() {
        let doc = Document::new(
            "q",
            "Why do plates move? Why do rocks melt? Why do ridges open?",
            None,
            None,
        );
        let builder = RevisionCardBuilder {
            section_budget_chars: 20,
            max_group_docs: 8,
        };
        let card = build(&builder, &[&doc]).unwrap();
        // Each question is under 20 chars, so one per section.
        assert_eq!(card.section(SectionKind::OpenQuestions).entries.len(), 1);
        assert_eq!(card.populated_sections(), 3);
        for section in &card.sections {
            let used: usize = section.entries.iter().map(|e| e.chars().count()).sum();
            assert!(used <= 20);
        }
    }

    #[test]
    fn test_sentence_longer_than_section_is_skipped() {
        let long = format!("{}ends here.", "Tectonics magma crust mantle ".repeat(27));
        let text = format!("{} Plates move slowly. Magma rises at ridges.", long);
        let doc = Document::new("geo", &text, None, None);
        let card = build(&RevisionCardBuilder::default(), &[&doc]).unwrap();

        let entries: Vec<&String> = card.sections.iter().flat_map(|s| &s.entries).collect();
        assert_eq!(entries.len(), 2);
        for entry in entries {
            assert!(entry.chars().count() <= 600);
            assert!(entry.ends_with('.'), "cut entry: {}", entry);
        }
    }

    #[test]
    fn test_lone_long_sentence_is_marked_when_cut() {
        let long = format!("{}ends here.", "Tectonics magma crust mantle ".repeat(27));
        let doc = Document::new("geo", &long, None, None);
        let card = build(&RevisionCardBuilder::default(), &[&doc]).unwrap();

        assert_eq!(card.populated_sections(), 1);
        let entry = &card.section(SectionKind::KeyConcepts).entries[0];
        assert!(entry.chars().count() <= 600);
        assert!(entry.ends_with('…'));
        assert!(entry.starts_with("Tectonics magma crust mantle"));
    }

    #[test]
    fn test_extract_references() {
        let a = Document::new(
            "a",
            "Short line 1989.\n\
             Wegener, A. The Origin of Continents and Oceans, 1915. Reprinted often.\n\
             See doi:10.1000/xyz123 for the dataset used in this course.\n\
             Plates move slowly over the mantle of the whole planet.",
            None,
            None,
        );
        let b = Document::new(
            "b",
            "Wegener, A. The Origin of Continents and Oceans, 1915. Reprinted often.",
            None,
            None,
        );
        let refs = extract_references(&[&a, &b]).unwrap();
        assert_eq!(
            refs,
            vec![
                "Wegener, A. The Origin of Continents and Oceans, 1915.".to_string(),
                "See doi:10.1000/xyz123 for the dataset used in this course.".to_string(),
            ]
        );
    }

    #[test]
    fn test_references_are_capped_and_clipped() {
        let text = (0..10)
            .map(|i| format!("Author {} wrote a long study of the subject in 19{}0", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let long = format!("{} 2001", "word ".repeat(50));
        let doc = Document::new("d", &format!("{}\n{}", long, text), None, None);

        let refs = extract_references(&[&doc]).unwrap();
        assert_eq!(refs.len(), 6);
        assert!(refs[0].ends_with('…'));
        assert!(refs[0].chars().count() <= 161);
        assert!(refs[1].starts_with("Author 0"));
    }

    #[test]
    fn test_card_lists_references() {
        let doc = Document::new(
            "geo",
            "Plates move slowly.\nWegener, A. The Origin of Continents and Oceans, 1915.",
            None,
            None,
        );
        let card = build(&RevisionCardBuilder::default(), &[&doc]).unwrap();
        assert_eq!(card.references.len(), 1);
        assert!(card
            .to_markdown()
            .contains("## References\n- Wegener, A. The Origin of Continents and Oceans, 1915."));
    }

    #[test]
    fn test_sources_cover_all_group_documents() {
        let a = Document::new("a", "Alpha content here.", None, None);
        let b = Document::new("b", "Beta content there.", None, None);
        let card = build(&RevisionCardBuilder::default(), &[&a, &b]).unwrap();
        let ids: Vec<&str> = card.sources.ids().collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(card.version, 1);
    }

    #[test]
    fn test_empty_group_fails() {
        let err = build(&RevisionCardBuilder::default(), &[]).unwrap_err();
        assert!(matches!(err, Error::RegenerationFailure(_)));
    }
}
