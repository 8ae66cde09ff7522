//! # Fiche Core
//!
//! Relevance weighting and artifact synchronization for a personal,
//! bilingual (English/French) document corpus: stopword resolution,
//! tokenization, an incremental TF-IDF index, relevance selection, and the
//! two artifacts built from it (extractive summaries and four-section
//! revision cards), kept in sync as the corpus changes.
//!
//! This crate has no storage, async runtime, or file format dependencies.
//! Durability is delegated through [`hooks::CorpusHooks`].
//!
//! ```text
//! StopwordRegistry ─► Tokenizer ─► TfIdfIndex ─► RelevanceSelector ─┬─► SummaryGenerator
//!                                                                   └─► RevisionCardBuilder
//! ```

pub mod artifacts;
pub mod card;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod index;
pub mod models;
pub mod select;
pub mod stopwords;
pub mod summary;
pub mod vectorize;

pub use engine::{Engine, IngestOutcome, IngestRequest};
pub use error::{Error, Result};
