//! Durability hooks.
//!
//! The engine has no storage of its own. Whatever keeps documents and
//! artifacts across restarts implements [`CorpusHooks`]; every method has
//! a no-op default. Hooks are called synchronously while the engine holds
//! its locks, so implementations should only record the event and return.

use crate::models::{Artifact, ArtifactId, ArtifactState, Document};

pub trait CorpusHooks: Send + Sync {
    /// A document was ingested, or re-ingested with new text.
    fn on_document_added(&self, _document: &Document) {}

    fn on_document_removed(&self, _document_id: &str) {}

    /// A regeneration produced a new version.
    fn on_artifact_regenerated(&self, _artifact: &Artifact) {}

    /// An artifact changed state without a new version (marked dirty,
    /// failed regeneration).
    fn on_artifact_state_changed(&self, _id: &ArtifactId, _state: ArtifactState) {}

    /// An artifact was removed along with its group or summary request.
    fn on_artifact_removed(&self, _id: &ArtifactId) {}
}

/// Hooks that ignore every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl CorpusHooks for NoHooks {}
