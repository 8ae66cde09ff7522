//! Artifact registry: freshness state, versions, and single-flight
//! regeneration.
//!
//! # State machine
//!
//! ```text
//!   (first request) ──► Regenerating ──ok──► Fresh ──source change──► Dirty
//!                           ▲   │                                      │
//!                           │   └──err──► Dirty                        │
//!                           └──────────────── next request ◄───────────┘
//! ```
//!
//! A failed regeneration never replaces the last good artifact; callers
//! keep receiving it while the state reports `Dirty`.
//!
//! # Single flight
//!
//! Regenerations are keyed by (artifact id, source snapshot digest, corpus
//! version). The first caller for a key runs the build outside the registry
//! lock. Later callers for the same key wait on a condition variable and
//! receive the leader's outcome, so the build runs once.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::hooks::CorpusHooks;
use crate::models::{Artifact, ArtifactId, ArtifactMeta, ArtifactState, SourceSnapshot};

/// Persisted form of one registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    pub state: ArtifactState,
    /// Last successfully generated artifact.
    pub artifact: Option<Artifact>,
    /// Highest version ever produced.
    pub version: u64,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegenKey {
    id: ArtifactId,
    digest: String,
    corpus_version: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    state: ArtifactState,
    current: Option<Artifact>,
    version: u64,
    last_error: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn new() -> Self {
        Self {
            state: ArtifactState::Regenerating,
            current: None,
            version: 0,
            last_error: None,
            updated_at: None,
        }
    }
}

#[derive(Debug)]
struct Flight {
    outcome: Option<Result<Artifact>>,
    waiters: usize,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<ArtifactId, Entry>,
    in_flight: HashMap<RegenKey, Flight>,
}

/// Tracks every artifact the engine has been asked for.
pub struct ArtifactRegistry {
    inner: Mutex<Inner>,
    settled: Condvar,
    hooks: Arc<dyn CorpusHooks>,
}

impl std::fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactRegistry").finish_non_exhaustive()
    }
}

impl ArtifactRegistry {
    pub fn new(hooks: Arc<dyn CorpusHooks>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            settled: Condvar::new(),
            hooks,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load persisted entries. Anything caught mid-regeneration is `Dirty`.
    pub fn restore(&self, records: impl IntoIterator<Item = ArtifactRecord>) -> usize {
        let mut inner = self.lock();
        let mut n = 0;
        for record in records {
            let state = match record.state {
                ArtifactState::Regenerating => ArtifactState::Dirty,
                s => s,
            };
            let version = record
                .version
                .max(record.artifact.as_ref().map_or(0, Artifact::version));
            inner.entries.insert(
                record.id,
                Entry {
                    state,
                    current: record.artifact,
                    version,
                    last_error: record.last_error,
                    updated_at: record.updated_at,
                },
            );
            n += 1;
        }
        debug!(restored = n, "artifact registry restored");
        n
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.lock().entries.contains_key(id)
    }

    pub fn state(&self, id: &ArtifactId) -> Option<ArtifactState> {
        self.lock().entries.get(id).map(|e| e.state)
    }

    /// Last good artifact, whatever the current state.
    pub fn current(&self, id: &ArtifactId) -> Option<Artifact> {
        self.lock().entries.get(id).and_then(|e| e.current.clone())
    }

    pub fn last_error(&self, id: &ArtifactId) -> Option<String> {
        self.lock().entries.get(id).and_then(|e| e.last_error.clone())
    }

    pub fn ids(&self) -> Vec<ArtifactId> {
        let mut ids: Vec<_> = self.lock().entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Mark a fresh artifact dirty. Returns whether the state changed.
    pub fn mark_dirty(&self, id: &ArtifactId) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(id) else {
            return false;
        };
        if entry.state != ArtifactState::Fresh {
            return false;
        }
        entry.state = ArtifactState::Dirty;
        entry.updated_at = Some(Utc::now());
        drop(inner);
        debug!(artifact = %id, "marked dirty");
        self.hooks.on_artifact_state_changed(id, ArtifactState::Dirty);
        true
    }

    /// Forget an artifact entirely.
    pub fn remove(&self, id: &ArtifactId) -> bool {
        let removed = self.lock().entries.remove(id).is_some();
        if removed {
            info!(artifact = %id, "artifact removed");
            self.hooks.on_artifact_removed(id);
        }
        removed
    }

    /// Return the artifact for `id`, regenerating it with `build` unless a
    /// fresh version built from `snapshot` exists.
    ///
    /// `build` returns an artifact whose version is assigned here. On
    /// failure the entry is left `Dirty` and the previous artifact is
    /// returned if there is one.
    pub fn ensure<F>(
        &self,
        id: &ArtifactId,
        snapshot: &SourceSnapshot,
        corpus_version: u64,
        build: F,
    ) -> Result<Artifact>
    where
        F: FnOnce() -> Result<Artifact>,
    {
        let key = RegenKey {
            id: id.clone(),
            digest: snapshot.digest(),
            corpus_version,
        };

        let mut inner = self.lock();

        if let Some(entry) = inner.entries.get(id) {
            if entry.state == ArtifactState::Fresh {
                if let Some(current) = &entry.current {
                    if current.sources() == snapshot {
                        return Ok(current.clone());
                    }
                }
            }
        }

        let joined = match inner.in_flight.get_mut(&key) {
            Some(flight) => {
                flight.waiters += 1;
                true
            }
            None => false,
        };
        if joined {
            debug!(artifact = %id, "waiting for in-flight regeneration");
            loop {
                let done = inner
                    .in_flight
                    .get(&key)
                    .map_or(true, |f| f.outcome.is_some());
                if done {
                    break;
                }
                inner = self
                    .settled
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            let outcome = match inner.in_flight.get_mut(&key) {
                Some(flight) => {
                    flight.waiters -= 1;
                    let outcome = flight.outcome.clone();
                    if flight.waiters == 0 {
                        inner.in_flight.remove(&key);
                    }
                    outcome
                }
                None => None,
            };
            let outcome = outcome.unwrap_or_else(|| {
                Err(Error::RegenerationFailure(
                    "in-flight regeneration vanished".to_string(),
                ))
            });
            return Self::served(&inner, id, outcome);
        }

        inner.in_flight.insert(
            key.clone(),
            Flight {
                outcome: None,
                waiters: 0,
            },
        );
        let entry = inner.entries.entry(id.clone()).or_insert_with(Entry::new);
        entry.state = ArtifactState::Regenerating;
        drop(inner);

        debug!(artifact = %id, corpus_version, "regenerating");
        let built = panic::catch_unwind(AssertUnwindSafe(build))
            .unwrap_or_else(|_| Err(Error::RegenerationFailure("synthesis panicked".to_string())));

        let mut inner = self.lock();
        let entry = inner.entries.entry(id.clone()).or_insert_with(Entry::new);
        let now = Utc::now();
        let outcome = match built {
            Ok(mut artifact) => {
                entry.version += 1;
                artifact.set_version(entry.version);
                entry.state = ArtifactState::Fresh;
                entry.current = Some(artifact.clone());
                entry.last_error = None;
                entry.updated_at = Some(now);
                info!(artifact = %id, version = entry.version, "artifact regenerated");
                self.hooks.on_artifact_regenerated(&artifact);
                Ok(artifact)
            }
            Err(err) => {
                entry.state = ArtifactState::Dirty;
                entry.last_error = Some(err.to_string());
                entry.updated_at = Some(now);
                warn!(artifact = %id, error = %err, "regeneration failed");
                self.hooks.on_artifact_state_changed(id, ArtifactState::Dirty);
                Err(err)
            }
        };

        if let Some(flight) = inner.in_flight.get_mut(&key) {
            if flight.waiters == 0 {
                inner.in_flight.remove(&key);
            } else {
                flight.outcome = Some(outcome.clone());
            }
        }
        self.settled.notify_all();
        Self::served(&inner, id, outcome)
    }

    /// What a caller receives: the new artifact, or on failure the last
    /// good one.
    fn served(inner: &Inner, id: &ArtifactId, outcome: Result<Artifact>) -> Result<Artifact> {
        match outcome {
            Ok(artifact) => Ok(artifact),
            Err(err) => inner
                .entries
                .get(id)
                .and_then(|e| e.current.clone())
                .ok_or(err),
        }
    }

    /// Metadata for every artifact, sorted by id.
    pub fn listing(&self) -> Vec<ArtifactMeta> {
        let inner = self.lock();
        let mut metas: Vec<ArtifactMeta> = inner
            .entries
            .iter()
            .map(|(id, e)| ArtifactMeta {
                id: id.clone(),
                state: e.state,
                version: e.current.as_ref().map(Artifact::version),
                sources: e
                    .current
                    .as_ref()
                    .map(|a| a.sources().ids().map(String::from).collect())
                    .unwrap_or_default(),
                updated_at: e.updated_at,
            })
            .collect();
        metas.sort_by(|a, b| a.id.cmp(&b.id));
        metas
    }

    /// Snapshot of every entry for persistence.
    pub fn records(&self) -> Vec<ArtifactRecord> {
        let inner = self.lock();
        let mut records: Vec<ArtifactRecord> = inner
            .entries
            .iter()
            .map(|(id, e)| ArtifactRecord {
                id: id.clone(),
                state: e.state,
                artifact: e.current.clone(),
                version: e.version,
                last_error: e.last_error.clone(),
                updated_at: e.updated_at,
            })
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Persisted form of one entry.
    pub fn record(&self, id: &ArtifactId) -> Option<ArtifactRecord> {
        let inner = self.lock();
        inner.entries.get(id).map(|e| ArtifactRecord {
            id: id.clone(),
            state: e.state,
            artifact: e.current.clone(),
            version: e.version,
            last_error: e.last_error.clone(),
            updated_at: e.updated_at,
        })
    }
}
