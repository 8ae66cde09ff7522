//! Error types for the Fiche engine.
//!
//! `NotFound`, `EmptyInput` and `InvalidOperation` are recoverable and
//! reported to the caller. `RegenerationFailure` is absorbed by the artifact
//! registry, which keeps serving the last fresh version. `InconsistentIndex`
//! is fatal for the index: once raised, no further mutation is accepted.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What an unknown id referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Document,
    Artifact,
    Group,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Document => write!(f, "document"),
            EntityKind::Artifact => write!(f, "artifact"),
            EntityKind::Group => write!(f, "group"),
        }
    }
}

/// Errors raised by the engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// An operation referenced an id the engine does not know.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Ingestion was given text with nothing in it.
    #[error("no usable text in input")]
    EmptyInput,

    /// Artifact synthesis failed; the prior version (if any) is retained.
    #[error("regeneration failed: {0}")]
    RegenerationFailure(String),

    /// An internal index invariant does not hold.
    #[error("inconsistent index: {0}")]
    InconsistentIndex(String),

    /// The request is malformed for the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    pub fn document_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: EntityKind::Document,
            id: id.into(),
        }
    }

    pub fn artifact_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: EntityKind::Artifact,
            id: id.into(),
        }
    }

    pub fn group_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: EntityKind::Group,
            id: id.into(),
        }
    }
}
