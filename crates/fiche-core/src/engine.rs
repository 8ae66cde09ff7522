//! The engine facade: corpus, index, groups and artifacts behind one API.
//!
//! # Locking
//!
//! Documents, the TF-IDF index, groups and the corpus version share one
//! `RwLock`. Ingestion and removal take it for writing, so mutations are
//! serialized. Reads (`weight`, `top_terms`, `select`) and artifact requests
//! take it for reading; a regeneration keeps its read guard until it
//! finishes, so the corpus version in its key cannot move underneath it.
//! The artifact registry has its own mutex, always taken after the corpus
//! lock.
//!
//! # Freshness
//!
//! | Mutation of document `d`        | Marked dirty                               |
//! |---------------------------------|--------------------------------------------|
//! | added, or re-ingested changed   | summary of `d`, groups listing `d`, all/theme groups |
//! | removed                         | same                                       |
//! | re-ingested with the same text  | nothing                                    |

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifacts::{ArtifactRecord, ArtifactRegistry};
use crate::card::RevisionCardBuilder;
use crate::error::{Error, Result};
use crate::hooks::{CorpusHooks, NoHooks};
use crate::index::TfIdfIndex;
use crate::models::{
    Artifact, ArtifactId, ArtifactMeta, ArtifactState, Document, DocumentGroup, GroupMembers,
    RevisionCard, SourceSnapshot, Summary,
};
use crate::select::{split_sentences, Budget, RelevanceSelector, ScoredSpan};
use crate::stopwords::StopwordSet;
use crate::summary::SummaryGenerator;
use crate::vectorize::Tokenizer;

/// A document handed over by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub id: String,
    pub text: String,
    pub language: Option<String>,
    pub title: Option<String>,
}

impl IngestRequest {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            language: None,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// What an ingestion did to the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Added,
    Updated,
    Unchanged,
}

/// Corpus-level counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub documents: usize,
    pub terms: usize,
    pub corpus_version: u64,
    pub groups: usize,
    pub artifacts: usize,
    pub dirty_artifacts: usize,
}

#[derive(Debug, Default)]
struct Corpus {
    documents: BTreeMap<String, Document>,
    index: TfIdfIndex,
    groups: BTreeMap<String, DocumentGroup>,
    version: u64,
}

/// Relevance weighting and artifact synchronization over one corpus.
pub struct Engine {
    corpus: RwLock<Corpus>,
    stopwords: Arc<StopwordSet>,
    tokenizer: Tokenizer,
    summaries: SummaryGenerator,
    cards: RevisionCardBuilder,
    registry: ArtifactRegistry,
    hooks: Arc<dyn CorpusHooks>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("summaries", &self.summaries)
            .field("cards", &self.cards)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    stopwords: Arc<StopwordSet>,
    tokenizer: Tokenizer,
    summaries: SummaryGenerator,
    cards: RevisionCardBuilder,
    hooks: Arc<dyn CorpusHooks>,
}

impl EngineBuilder {
    pub fn tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn summaries(mut self, summaries: SummaryGenerator) -> Self {
        self.summaries = summaries;
        self
    }

    pub fn cards(mut self, cards: RevisionCardBuilder) -> Self {
        self.cards = cards;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn CorpusHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            corpus: RwLock::new(Corpus::default()),
            stopwords: self.stopwords,
            tokenizer: self.tokenizer,
            summaries: self.summaries,
            cards: self.cards,
            registry: ArtifactRegistry::new(Arc::clone(&self.hooks)),
            hooks: self.hooks,
        }
    }
}

impl Engine {
    pub fn builder(stopwords: Arc<StopwordSet>) -> EngineBuilder {
        EngineBuilder {
            stopwords,
            tokenizer: Tokenizer::new(),
            summaries: SummaryGenerator::default(),
            cards: RevisionCardBuilder::default(),
            hooks: Arc::new(NoHooks),
        }
    }

    /// Engine with default parameters and no hooks.
    pub fn new(stopwords: Arc<StopwordSet>) -> Self {
        Self::builder(stopwords).build()
    }

    fn read(&self) -> RwLockReadGuard<'_, Corpus> {
        self.corpus.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Corpus> {
        self.corpus.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn selector(&self) -> RelevanceSelector<'_> {
        RelevanceSelector::new(&self.tokenizer, &self.stopwords)
    }

    pub fn stopwords(&self) -> &StopwordSet {
        &self.stopwords
    }

    // ------------------------------------------------------------------
    // Corpus mutation
    // ------------------------------------------------------------------

    /// Add a document, or replace the text of an existing one.
    ///
    /// Blank text is rejected with `EmptyInput`. Re-ingesting identical
    /// text changes nothing.
    pub fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        let IngestRequest {
            id,
            text,
            language,
            title,
        } = request;
        if id.trim().is_empty() {
            return Err(Error::InvalidOperation("document id is empty".to_string()));
        }
        let document = Document::new(id, &text, language, title);
        if document.text.is_empty() {
            return Err(Error::EmptyInput);
        }

        let mut corpus = self.write();
        let outcome = match corpus.documents.get(&document.id) {
            Some(existing) if existing.fingerprint == document.fingerprint => {
                debug!(id = %document.id, "unchanged, skipping");
                return Ok(IngestOutcome::Unchanged);
            }
            Some(_) => IngestOutcome::Updated,
            None => IngestOutcome::Added,
        };

        let vector = self.tokenizer.vectorize(&document.text, &self.stopwords);
        if outcome == IngestOutcome::Updated {
            corpus.index.remove_document(&document.id)?;
            corpus.documents.remove(&document.id);
        }
        let terms = vector.len();
        corpus.index.add_document(&document.id, vector)?;
        corpus.version += 1;

        info!(
            id = %document.id,
            terms,
            corpus_version = corpus.version,
            "document {}",
            if outcome == IngestOutcome::Added { "added" } else { "updated" }
        );
        self.mark_affected(&corpus, &document.id);
        self.hooks.on_document_added(&document);
        corpus.documents.insert(document.id.clone(), document);
        Ok(outcome)
    }

    /// Remove a document from the corpus and the index.
    pub fn remove(&self, id: &str) -> Result<Document> {
        let mut corpus = self.write();
        if !corpus.documents.contains_key(id) {
            return Err(Error::document_not_found(id));
        }
        corpus.index.remove_document(id)?;
        let document = corpus
            .documents
            .remove(id)
            .ok_or_else(|| Error::document_not_found(id))?;
        corpus.version += 1;

        info!(id, corpus_version = corpus.version, "document removed");
        self.mark_affected(&corpus, id);
        self.hooks.on_document_removed(id);
        Ok(document)
    }

    fn mark_affected(&self, corpus: &Corpus, document_id: &str) {
        self.registry.mark_dirty(&ArtifactId::Summary(document_id.to_string()));
        for group in corpus.groups.values() {
            if group.is_affected_by(document_id) {
                self.registry.mark_dirty(&ArtifactId::Card(group.name.clone()));
            }
        }
    }

    // ------------------------------------------------------------------
    // Corpus reads
    // ------------------------------------------------------------------

    pub fn document(&self, id: &str) -> Result<Document> {
        self.read()
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| Error::document_not_found(id))
    }

    /// All documents in id order.
    pub fn documents(&self) -> Vec<Document> {
        self.read().documents.values().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().documents.contains_key(id)
    }

    pub fn corpus_version(&self) -> u64 {
        self.read().version
    }

    /// TF-IDF weight of `term` in a document. The term is lowercased first.
    pub fn weight(&self, document_id: &str, term: &str) -> Result<f64> {
        self.read().index.weight(document_id, &term.to_lowercase())
    }

    pub fn idf(&self, term: &str) -> f64 {
        self.read().index.idf(&term.to_lowercase())
    }

    pub fn doc_freq(&self, term: &str) -> usize {
        self.read().index.doc_freq(&term.to_lowercase())
    }

    pub fn top_terms(&self, document_id: &str, k: usize) -> Result<Vec<(String, f64)>> {
        self.read().index.top_terms(document_id, k)
    }

    /// Rank the sentences of `document_ids` (in that order) and fill `budget`.
    pub fn select(&self, document_ids: &[&str], budget: Budget) -> Result<Vec<ScoredSpan>> {
        let corpus = self.read();
        let mut spans = Vec::new();
        for (order, id) in document_ids.iter().enumerate() {
            let doc = corpus
                .documents
                .get(*id)
                .ok_or_else(|| Error::document_not_found(*id))?;
            spans.extend(split_sentences(&doc.id, order, &doc.text));
        }
        Ok(self.selector().select(&spans, &corpus.index, budget))
    }

    /// Run the full index invariant check.
    pub fn verify(&self) -> Result<()> {
        self.read().index.verify()
    }

    // ------------------------------------------------------------------
    // Summaries
    // ------------------------------------------------------------------

    /// Summary of a document, regenerated if missing or dirty.
    pub fn summary(&self, document_id: &str) -> Result<Summary> {
        let corpus = self.read();
        let doc = corpus
            .documents
            .get(document_id)
            .ok_or_else(|| Error::document_not_found(document_id))?;
        let id = ArtifactId::Summary(document_id.to_string());
        let snapshot = SourceSnapshot::from_documents([doc]);
        let selector = self.selector();

        let artifact = self.registry.ensure(&id, &snapshot, corpus.version, || {
            Ok(Artifact::Summary(
                self.summaries.summarize(doc, &selector, &corpus.index),
            ))
        })?;
        match artifact {
            Artifact::Summary(summary) => Ok(summary),
            Artifact::Card(_) => Err(Error::InvalidOperation(format!(
                "{} does not hold a summary",
                id
            ))),
        }
    }

    pub fn summary_status(&self, document_id: &str) -> Option<ArtifactState> {
        self.registry.state(&ArtifactId::Summary(document_id.to_string()))
    }

    /// Drop a summary and its history.
    pub fn forget_summary(&self, document_id: &str) -> Result<()> {
        let id = ArtifactId::Summary(document_id.to_string());
        if self.registry.remove(&id) {
            Ok(())
        } else {
            Err(Error::artifact_not_found(id.to_string()))
        }
    }

    // ------------------------------------------------------------------
    // Groups and revision cards
    // ------------------------------------------------------------------

    /// Register a document group. Creating an identical group again is a
    /// no-op; reusing a name for a different group is rejected.
    pub fn create_group(&self, group: DocumentGroup) -> Result<()> {
        if group.name.trim().is_empty() {
            return Err(Error::InvalidOperation("group name is empty".to_string()));
        }
        let mut corpus = self.write();
        match &group.members {
            GroupMembers::Documents { ids } => {
                if ids.is_empty() {
                    return Err(Error::EmptyInput);
                }
                if let Some(missing) = ids.iter().find(|id| !corpus.documents.contains_key(*id)) {
                    return Err(Error::document_not_found(missing.clone()));
                }
            }
            GroupMembers::Theme { theme } => {
                if self.tokenizer.vectorize(theme, &self.stopwords).is_empty() {
                    return Err(Error::EmptyInput);
                }
            }
            GroupMembers::All => {}
        }
        if let Some(existing) = corpus.groups.get(&group.name) {
            if existing == &group {
                return Ok(());
            }
            return Err(Error::InvalidOperation(format!(
                "group '{}' already exists",
                group.name
            )));
        }
        info!(
            group = %group.name,
            corpus_wide = group.is_corpus_wide(),
            "group created"
        );
        corpus.groups.insert(group.name.clone(), group);
        Ok(())
    }

    pub fn group(&self, name: &str) -> Result<DocumentGroup> {
        self.read()
            .groups
            .get(name)
            .cloned()
            .ok_or_else(|| Error::group_not_found(name))
    }

    pub fn groups(&self) -> Vec<DocumentGroup> {
        self.read().groups.values().cloned().collect()
    }

    /// Remove a group and its revision card.
    pub fn remove_group(&self, name: &str) -> Result<DocumentGroup> {
        let mut corpus = self.write();
        let group = corpus
            .groups
            .remove(name)
            .ok_or_else(|| Error::group_not_found(name))?;
        self.registry.remove(&ArtifactId::Card(name.to_string()));
        info!(group = name, "group removed");
        Ok(group)
    }

    /// Current members of a group, in group order.
    pub fn group_members(&self, name: &str) -> Result<Vec<String>> {
        let corpus = self.read();
        let group = corpus
            .groups
            .get(name)
            .ok_or_else(|| Error::group_not_found(name))?;
        Ok(self
            .resolve(&corpus, group)
            .into_iter()
            .map(|d| d.id.clone())
            .collect())
    }

    fn resolve<'c>(&self, corpus: &'c Corpus, group: &DocumentGroup) -> Vec<&'c Document> {
        match &group.members {
            GroupMembers::Documents { ids } => ids
                .iter()
                .filter_map(|id| corpus.documents.get(id))
                .collect(),
            GroupMembers::All => corpus.documents.values().collect(),
            GroupMembers::Theme { theme } => {
                let query = self.tokenizer.vectorize(theme, &self.stopwords);
                let mut scored: Vec<(f64, &Document)> = corpus
                    .documents
                    .values()
                    .map(|d| (corpus.index.cosine_similarity(&query, &d.id), d))
                    .filter(|(score, _)| *score > 0.0)
                    .collect();
                scored.sort_by(|a, b| {
                    b.0.partial_cmp(&a.0)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.1.id.cmp(&b.1.id))
                });
                scored.truncate(self.cards.max_group_docs);
                scored.into_iter().map(|(_, d)| d).collect()
            }
        }
    }

    /// Revision card of a group, regenerated if missing or dirty.
    pub fn card(&self, name: &str) -> Result<RevisionCard> {
        let corpus = self.read();
        let group = corpus
            .groups
            .get(name)
            .ok_or_else(|| Error::group_not_found(name))?;
        let members = self.resolve(&corpus, group);
        let id = ArtifactId::Card(name.to_string());
        let snapshot = SourceSnapshot::from_documents(members.iter().copied());
        let selector = self.selector();

        let artifact = self.registry.ensure(&id, &snapshot, corpus.version, || {
            self.cards
                .build(name, &members, &selector, &corpus.index)
                .map(Artifact::Card)
        })?;
        match artifact {
            Artifact::Card(card) => Ok(card),
            Artifact::Summary(_) => Err(Error::InvalidOperation(format!(
                "{} does not hold a card",
                id
            ))),
        }
    }

    pub fn card_status(&self, name: &str) -> Option<ArtifactState> {
        self.registry.state(&ArtifactId::Card(name.to_string()))
    }

    // ------------------------------------------------------------------
    // Listing and recovery
    // ------------------------------------------------------------------

    pub fn artifact_listing(&self) -> Vec<ArtifactMeta> {
        self.registry.listing()
    }

    pub fn artifact_records(&self) -> Vec<ArtifactRecord> {
        self.registry.records()
    }

    pub fn artifact_record(&self, id: &ArtifactId) -> Option<ArtifactRecord> {
        self.registry.record(id)
    }

    /// Last error of a failed regeneration, if the artifact is dirty
    /// because of one.
    pub fn artifact_error(&self, id: &ArtifactId) -> Option<String> {
        self.registry.last_error(id)
    }

    pub fn stats(&self) -> CorpusStats {
        let corpus = self.read();
        let listing = self.registry.listing();
        CorpusStats {
            documents: corpus.documents.len(),
            terms: corpus.index.term_count(),
            corpus_version: corpus.version,
            groups: corpus.groups.len(),
            artifacts: listing.len(),
            dirty_artifacts: listing
                .iter()
                .filter(|m| m.state != ArtifactState::Fresh)
                .count(),
        }
    }

    /// Rebuild in-memory state from persisted documents, groups and
    /// artifact records. Hooks are not called for restored documents.
    ///
    /// Artifacts whose recorded sources no longer match the corpus are
    /// marked dirty, as are those interrupted mid-regeneration.
    pub fn restore(
        &self,
        documents: Vec<Document>,
        groups: Vec<DocumentGroup>,
        records: Vec<ArtifactRecord>,
    ) -> Result<()> {
        let mut corpus = self.write();
        if !corpus.documents.is_empty() {
            return Err(Error::InvalidOperation(
                "restore requires an empty engine".to_string(),
            ));
        }
        for document in documents {
            let vector = self.tokenizer.vectorize(&document.text, &self.stopwords);
            corpus.index.add_document(&document.id, vector)?;
            corpus.documents.insert(document.id.clone(), document);
        }
        corpus.version = corpus.documents.len() as u64;
        for group in groups {
            corpus.groups.insert(group.name.clone(), group);
        }
        let restored = self.registry.restore(records);

        let mut stale = 0usize;
        for id in self.registry.ids() {
            let current = match &id {
                ArtifactId::Summary(doc_id) => corpus
                    .documents
                    .get(doc_id)
                    .map(|d| SourceSnapshot::from_documents([d])),
                ArtifactId::Card(name) => corpus
                    .groups
                    .get(name)
                    .map(|g| SourceSnapshot::from_documents(self.resolve(&corpus, g))),
            };
            let recorded = self.registry.current(&id).map(|a| a.sources().clone());
            if current != recorded && self.registry.mark_dirty(&id) {
                stale += 1;
            }
        }
        if stale > 0 {
            warn!(stale, "artifacts out of date after restore");
        }
        info!(
            documents = corpus.documents.len(),
            groups = corpus.groups.len(),
            artifacts = restored,
            "engine restored"
        );
        Ok(())
    }
}
