//! Core data models: documents, artifacts, and document groups.
//!
//! Artifacts (summaries and revision cards) reference their source
//! documents by id and carry a [`SourceSnapshot`] of the fingerprints they
//! were built from. The snapshot is what freshness is judged against.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;

/// A document held by the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: Option<String>,
    /// Normalized text (see [`normalize_text`]).
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub fingerprint: String,
    pub language: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// Build a document from raw text, normalizing it and computing its
    /// fingerprint.
    pub fn new(
        id: impl Into<String>,
        raw_text: &str,
        language: Option<String>,
        title: Option<String>,
    ) -> Self {
        let text = normalize_text(raw_text);
        let fingerprint = fingerprint(&text);
        Self {
            id: id.into(),
            title,
            text,
            fingerprint,
            language,
            ingested_at: Utc::now(),
        }
    }

    /// Title for display, falling back to the id.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// Normalize line endings and strip surrounding whitespace.
///
/// Two texts that differ only by `\r\n` vs `\n` get the same fingerprint.
pub fn normalize_text(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Hex SHA-256 of a text.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprints of the documents an artifact was built from, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSnapshot(BTreeMap<String, String>);

impl SourceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents<'a>(docs: impl IntoIterator<Item = &'a Document>) -> Self {
        Self(
            docs.into_iter()
                .map(|d| (d.id.clone(), d.fingerprint.clone()))
                .collect(),
        )
    }

    pub fn insert(&mut self, id: impl Into<String>, fingerprint: impl Into<String>) {
        self.0.insert(id.into(), fingerprint.into());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn fingerprint_of(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable digest over `(id, fingerprint)` pairs in id order.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (id, fp) in &self.0 {
            hasher.update(id.as_bytes());
            hasher.update([0u8]);
            hasher.update(fp.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Identifies one artifact: the summary of a document or a named card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum ArtifactId {
    Summary(String),
    Card(String),
}

impl ArtifactId {
    pub fn kind(&self) -> &'static str {
        match self {
            ArtifactId::Summary(_) => "summary",
            ArtifactId::Card(_) => "card",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            ArtifactId::Summary(k) | ArtifactId::Card(k) => k,
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}

impl FromStr for ArtifactId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("summary", key)) if !key.is_empty() => Ok(ArtifactId::Summary(key.to_string())),
            Some(("card", key)) if !key.is_empty() => Ok(ArtifactId::Card(key.to_string())),
            _ => Err(Error::InvalidOperation(format!(
                "malformed artifact id: '{}'",
                s
            ))),
        }
    }
}

/// Freshness of an artifact relative to its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    Fresh,
    Dirty,
    Regenerating,
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactState::Fresh => write!(f, "fresh"),
            ArtifactState::Dirty => write!(f, "dirty"),
            ArtifactState::Regenerating => write!(f, "regenerating"),
        }
    }
}

/// An extractive summary of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub document_id: String,
    pub title: Option<String>,
    pub text: String,
    pub version: u64,
    pub sources: SourceSnapshot,
    pub generated_at: DateTime<Utc>,
}

impl Summary {
    pub fn to_markdown(&self) -> String {
        let title = self.title.as_deref().unwrap_or(&self.document_id);
        let body = if self.text.is_empty() {
            "(Summary unavailable)"
        } else {
            &self.text
        };
        format!("# {}\n\n{}\n", title, body)
    }
}

/// The four fixed sections of a revision card, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    KeyConcepts,
    Definitions,
    Examples,
    OpenQuestions,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [
        SectionKind::KeyConcepts,
        SectionKind::Definitions,
        SectionKind::Examples,
        SectionKind::OpenQuestions,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            SectionKind::KeyConcepts => "Key concepts",
            SectionKind::Definitions => "Definitions",
            SectionKind::Examples => "Examples",
            SectionKind::OpenQuestions => "Open questions",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            SectionKind::KeyConcepts => 0,
            SectionKind::Definitions => 1,
            SectionKind::Examples => 2,
            SectionKind::OpenQuestions => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSection {
    pub kind: SectionKind,
    pub entries: Vec<String>,
}

impl CardSection {
    pub fn empty(kind: SectionKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A four-section revision card built from a document group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionCard {
    pub name: String,
    pub sources: SourceSnapshot,
    /// Always exactly four sections, in [`SectionKind::ALL`] order.
    pub sections: [CardSection; 4],
    /// Citation-like lines found in the group's documents.
    #[serde(default)]
    pub references: Vec<String>,
    pub version: u64,
    pub generated_at: DateTime<Utc>,
}

impl RevisionCard {
    pub fn section(&self, kind: SectionKind) -> &CardSection {
        &self.sections[kind.index()]
    }

    pub fn populated_sections(&self) -> usize {
        self.sections.iter().filter(|s| !s.is_empty()).count()
    }

    pub fn to_markdown(&self) -> String {
        let mut lines = vec![format!("# {}", self.name)];
        for (i, section) in self.sections.iter().enumerate() {
            lines.push(String::new());
            lines.push(format!("## {}. {}", i + 1, section.kind.title()));
            if section.entries.is_empty() {
                lines.push("- (none)".to_string());
            } else {
                lines.extend(section.entries.iter().map(|e| format!("- {}", e)));
            }
        }
        if !self.references.is_empty() {
            lines.push(String::new());
            lines.push("## References".to_string());
            lines.extend(self.references.iter().map(|r| format!("- {}", r)));
        }
        lines.push(String::new());
        lines.push("## Sources".to_string());
        lines.extend(self.sources.ids().map(|id| format!("- {}", id)));
        lines.join("\n") + "\n"
    }
}

/// A generated artifact of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Summary(Summary),
    Card(RevisionCard),
}

impl Artifact {
    pub fn id(&self) -> ArtifactId {
        match self {
            Artifact::Summary(s) => ArtifactId::Summary(s.document_id.clone()),
            Artifact::Card(c) => ArtifactId::Card(c.name.clone()),
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Artifact::Summary(s) => s.version,
            Artifact::Card(c) => c.version,
        }
    }

    pub fn set_version(&mut self, version: u64) {
        match self {
            Artifact::Summary(s) => s.version = version,
            Artifact::Card(c) => c.version = version,
        }
    }

    pub fn sources(&self) -> &SourceSnapshot {
        match self {
            Artifact::Summary(s) => &s.sources,
            Artifact::Card(c) => &c.sources,
        }
    }
}

/// Metadata exposed to report and listing collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactMeta {
    pub id: ArtifactId,
    pub state: ArtifactState,
    /// Version of the servable artifact, `None` if none was ever produced.
    pub version: Option<u64>,
    pub sources: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// How a card's document group picks its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GroupMembers {
    /// An explicit list of document ids.
    Documents { ids: Vec<String> },
    /// Every document in the corpus.
    All,
    /// Documents most similar to a theme string.
    Theme { theme: String },
}

/// A named set of documents a revision card is built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentGroup {
    pub name: String,
    pub members: GroupMembers,
}

impl DocumentGroup {
    pub fn documents(name: impl Into<String>, ids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members: GroupMembers::Documents { ids },
        }
    }

    pub fn all(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: GroupMembers::All,
        }
    }

    pub fn theme(name: impl Into<String>, theme: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: GroupMembers::Theme {
                theme: theme.into(),
            },
        }
    }

    /// Whether membership is computed from the whole corpus, so any corpus
    /// change can alter it.
    pub fn is_corpus_wide(&self) -> bool {
        !matches!(self.members, GroupMembers::Documents { .. })
    }

    /// Whether a mutation of `doc_id` affects this group.
    pub fn is_affected_by(&self, doc_id: &str) -> bool {
        match &self.members {
            GroupMembers::Documents { ids } => ids.iter().any(|id| id == doc_id),
            GroupMembers::All | GroupMembers::Theme { .. } => true,
        }
    }
}
