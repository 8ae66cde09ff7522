//! Incremental TF-IDF index over the corpus.
//!
//! Layout:
//! - `postings`: term → {document id → raw count}
//! - `doc_freq`: term → number of documents containing the term
//! - `vectors`: document id → [`DocumentVector`], the per-document arena
//! - `idf_cache`: term → idf, tagged with the corpus size it was computed at
//!
//! Adding or removing a document touches only the terms of that document:
//! their postings, document frequencies and cached idf entries. Entries for
//! other terms are revalidated lazily against the current document count.
//!
//! ```text
//! idf(t)       = ln((N + 1) / (df(t) + 1)) + 1
//! weight(d, t) = tf(t, d) × idf(t)
//! ```
//!
//! `tf` is the raw count. Longer documents score higher; this keeps weights
//! easy to explain. Terms no document contains are outside the vocabulary
//! and have idf 0.
//!
//! After every mutation the affected terms are checked against the
//! invariant `df(t) == |{d : tf(t, d) > 0}|`. A violation halts the index:
//! every later mutation returns [`Error::InconsistentIndex`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::vectorize::DocumentVector;

#[derive(Debug, Clone, Copy)]
struct CachedIdf {
    total_docs: usize,
    value: f64,
}

/// Source of per-document term weights, consumed by relevance selection.
pub trait TermWeights {
    /// Weight of `term` in `document_id`; 0 when either is unknown.
    fn term_weight(&self, document_id: &str, term: &str) -> f64;
}

/// Corpus-wide term statistics with incremental updates.
#[derive(Debug, Default)]
pub struct TfIdfIndex {
    postings: HashMap<String, BTreeMap<String, u32>>,
    doc_freq: HashMap<String, usize>,
    vectors: HashMap<String, DocumentVector>,
    idf_cache: Mutex<HashMap<String, CachedIdf>>,
    halted: Option<String>,
    version: u64,
}

/// Smoothed inverse document frequency.
pub fn smoothed_idf(total_docs: usize, doc_freq: usize) -> f64 {
    ((total_docs as f64 + 1.0) / (doc_freq as f64 + 1.0)).ln() + 1.0
}

impl TfIdfIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Add a document's vector to the corpus.
    ///
    /// Cost is proportional to the number of distinct terms in `vector`.
    pub fn add_document(&mut self, id: &str, vector: DocumentVector) -> Result<()> {
        self.ensure_writable()?;
        if self.vectors.contains_key(id) {
            return Err(Error::InvalidOperation(format!(
                "document already indexed: {}",
                id
            )));
        }

        {
            let mut cache = self.idf_cache.lock().unwrap_or_else(|e| e.into_inner());
            for (term, count) in vector.iter() {
                self.postings
                    .entry(term.to_string())
                    .or_default()
                    .insert(id.to_string(), count);
                *self.doc_freq.entry(term.to_string()).or_insert(0) += 1;
                cache.remove(term);
            }
        }

        let distinct = vector.len();
        let affected: Vec<String> = vector.terms().map(String::from).collect();
        self.vectors.insert(id.to_string(), vector);
        self.version += 1;
        debug!(
            document = id,
            terms = distinct,
            total_docs = self.vectors.len(),
            "indexed document"
        );

        self.check_terms(&affected)
    }

    /// Remove a document from the corpus.
    pub fn remove_document(&mut self, id: &str) -> Result<DocumentVector> {
        self.ensure_writable()?;
        let vector = self
            .vectors
            .remove(id)
            .ok_or_else(|| Error::document_not_found(id))?;

        {
            let mut cache = self.idf_cache.lock().unwrap_or_else(|e| e.into_inner());
            for term in vector.terms() {
                if let Some(docs) = self.postings.get_mut(term) {
                    docs.remove(id);
                    if docs.is_empty() {
                        self.postings.remove(term);
                    }
                }
                if let Some(df) = self.doc_freq.get_mut(term) {
                    *df = df.saturating_sub(1);
                    if *df == 0 {
                        self.doc_freq.remove(term);
                    }
                }
                cache.remove(term);
            }
        }

        self.version += 1;
        debug!(
            document = id,
            terms = vector.len(),
            total_docs = self.vectors.len(),
            "removed document"
        );

        let affected: Vec<String> = vector.terms().map(String::from).collect();
        self.check_terms(&affected)?;
        Ok(vector)
    }

    fn ensure_writable(&self) -> Result<()> {
        match &self.halted {
            Some(reason) => Err(Error::InconsistentIndex(reason.clone())),
            None => Ok(()),
        }
    }

    /// Check the df invariant for `terms`, halting the index on failure.
    fn check_terms(&mut self, terms: &[String]) -> Result<()> {
        for term in terms {
            let df = self.doc_freq(term);
            let posted = self.postings.get(term.as_str()).map_or(0, |p| p.len());
            if df != posted {
                return Err(self.halt(format!(
                    "term '{}' has df {} but {} postings",
                    term, df, posted
                )));
            }
        }
        Ok(())
    }

    fn halt(&mut self, reason: String) -> Error {
        error!(reason = %reason, "index invariant violated, refusing further mutation");
        self.halted = Some(reason.clone());
        Error::InconsistentIndex(reason)
    }

    /// Full invariant check: every df matches the number of stored vectors
    /// containing the term, and postings mirror the vectors.
    pub fn verify(&self) -> Result<()> {
        let mut counted: HashMap<&str, usize> = HashMap::new();
        for (doc_id, vector) in &self.vectors {
            for (term, count) in vector.iter() {
                *counted.entry(term).or_insert(0) += 1;
                let posted = self.postings.get(term).and_then(|p| p.get(doc_id)).copied();
                if posted != Some(count) {
                    return Err(Error::InconsistentIndex(format!(
                        "posting for '{}' in {} is {:?}, vector has {}",
                        term, doc_id, posted, count
                    )));
                }
            }
        }
        if counted.len() != self.doc_freq.len() {
            return Err(Error::InconsistentIndex(format!(
                "{} terms in vectors but {} in df table",
                counted.len(),
                self.doc_freq.len()
            )));
        }
        for (term, df) in &self.doc_freq {
            let actual = counted.get(term.as_str()).copied().unwrap_or(0);
            if actual != *df {
                return Err(Error::InconsistentIndex(format!(
                    "term '{}' has df {} but appears in {} documents",
                    term, df, actual
                )));
            }
        }
        Ok(())
    }

    /// Reason the index stopped accepting mutations, if it did.
    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Number of documents (N).
    pub fn total_docs(&self) -> usize {
        self.vectors.len()
    }

    /// Number of distinct terms across the corpus.
    pub fn term_count(&self) -> usize {
        self.doc_freq.len()
    }

    pub fn doc_freq(&self, term: &str) -> usize {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    /// Incremented on every successful mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vectors.contains_key(id)
    }

    pub fn vector(&self, id: &str) -> Option<&DocumentVector> {
        self.vectors.get(id)
    }

    /// Smoothed idf of `term`, cached until N or df(term) changes.
    ///
    /// A term no document contains is outside the vocabulary and weighs 0.
    pub fn idf(&self, term: &str) -> f64 {
        let n = self.total_docs();
        let df = self.doc_freq(term);
        if df == 0 {
            return 0.0;
        }
        let mut cache = self.idf_cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(term) {
            if cached.total_docs == n {
                return cached.value;
            }
        }
        let value = smoothed_idf(n, df);
        cache.insert(
            term.to_string(),
            CachedIdf {
                total_docs: n,
                value,
            },
        );
        value
    }

    // ------------------------------------------------------------------
    // Weights
    // ------------------------------------------------------------------

    /// `tf(term, document) × idf(term)`; 0 if the term is not in the document.
    pub fn weight(&self, document_id: &str, term: &str) -> Result<f64> {
        let vector = self
            .vectors
            .get(document_id)
            .ok_or_else(|| Error::document_not_found(document_id))?;
        let tf = vector.get(term);
        if tf == 0 {
            return Ok(0.0);
        }
        Ok(tf as f64 * self.idf(term))
    }

    /// The `k` highest-weighted terms of a document, ties in lexical order.
    pub fn top_terms(&self, document_id: &str, k: usize) -> Result<Vec<(String, f64)>> {
        let vector = self
            .vectors
            .get(document_id)
            .ok_or_else(|| Error::document_not_found(document_id))?;
        let mut weighted: Vec<(String, f64)> = vector
            .iter()
            .map(|(term, tf)| (term.to_string(), tf as f64 * self.idf(term)))
            .collect();
        weighted.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        weighted.truncate(k);
        Ok(weighted)
    }

    /// Cosine similarity between a query vector and a stored document, both
    /// weighted by tf × idf. 0 for unknown documents or empty vectors.
    pub fn cosine_similarity(&self, query: &DocumentVector, document_id: &str) -> f64 {
        let Some(doc) = self.vectors.get(document_id) else {
            return 0.0;
        };
        if query.is_empty() || doc.is_empty() {
            return 0.0;
        }
        let mut dot = 0.0;
        let mut q_norm = 0.0;
        for (term, tf) in query.iter() {
            let w = tf as f64 * self.idf(term);
            q_norm += w * w;
            let d_tf = doc.get(term);
            if d_tf > 0 {
                dot += w * d_tf as f64 * self.idf(term);
            }
        }
        let d_norm: f64 = doc
            .iter()
            .map(|(term, tf)| {
                let w = tf as f64 * self.idf(term);
                w * w
            })
            .sum();
        if q_norm <= f64::EPSILON || d_norm <= f64::EPSILON {
            return 0.0;
        }
        dot / (q_norm.sqrt() * d_norm.sqrt())
    }

    #[cfg(test)]
    fn corrupt_doc_freq(&mut self, term: &str, df: usize) {
        self.doc_freq.insert(term.to_string(), df);
    }
}

impl TermWeights for TfIdfIndex {
    fn term_weight(&self, document_id: &str, term: &str) -> f64 {
        self.weight(document_id, term).unwrap_or(0.0)
    }
}
