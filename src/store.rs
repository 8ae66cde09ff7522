//! Persistence of the corpus between CLI invocations.
//!
//! The engine keeps everything in memory and reports each mutation through
//! [`CorpusHooks`]. [`Journal`] records those events while a command runs;
//! [`flush`] writes them to SQLite in a single transaction when the command
//! completes. A command that fails before flushing leaves the database as
//! it was.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fiche_core::artifacts::ArtifactRecord;
use fiche_core::hooks::CorpusHooks;
use fiche_core::models::{fingerprint, Artifact, ArtifactId, ArtifactState, Document, DocumentGroup};
use fiche_core::Engine;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum Event {
    DocumentAdded(Document),
    DocumentRemoved(String),
    ArtifactChanged(ArtifactId),
}

/// Hook implementation that buffers engine events until [`flush`].
///
/// Also tracks where each document was read from, which the engine itself
/// does not know about.
#[derive(Debug, Default)]
pub struct Journal {
    events: Mutex<Vec<Event>>,
    sources: Mutex<BTreeMap<String, String>>,
}

impl Journal {
    fn push(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn pending(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn set_source(&self, document_id: &str, path: impl Into<String>) {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document_id.to_string(), path.into());
    }

    pub fn source_of(&self, document_id: &str) -> Option<String> {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document_id)
            .cloned()
    }

    /// Documents whose source path lies under `dir`, as `(id, path)`.
    pub fn sources_under(&self, dir: &str) -> Vec<(String, String)> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, path)| path.starts_with(&prefix))
            .map(|(id, path)| (id.clone(), path.clone()))
            .collect()
    }
}

impl CorpusHooks for Journal {
    fn on_document_added(&self, document: &Document) {
        self.push(Event::DocumentAdded(document.clone()));
    }

    fn on_document_removed(&self, document_id: &str) {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(document_id);
        self.push(Event::DocumentRemoved(document_id.to_string()));
    }

    fn on_artifact_regenerated(&self, artifact: &Artifact) {
        self.push(Event::ArtifactChanged(artifact.id()));
    }

    fn on_artifact_state_changed(&self, id: &ArtifactId, _state: ArtifactState) {
        self.push(Event::ArtifactChanged(id.clone()));
    }

    fn on_artifact_removed(&self, id: &ArtifactId) {
        self.push(Event::ArtifactChanged(id.clone()));
    }
}

/// A stored document and the path it was read from, if any.
pub struct StoredDocument {
    pub document: Document,
    pub source_path: Option<String>,
}

pub async fn load_documents(pool: &SqlitePool) -> Result<Vec<StoredDocument>> {
    let rows = sqlx::query(
        "SELECT id, title, source_path, language, body, fingerprint, ingested_at FROM documents ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get("id");
        let body: String = row.get("body");
        let stored_fp: String = row.get("fingerprint");
        let computed = fingerprint(&body);
        if computed != stored_fp {
            warn!(id = %id, "stored fingerprint does not match body, using recomputed value");
        }
        let ingested_at: i64 = row.get("ingested_at");
        out.push(StoredDocument {
            document: Document {
                id,
                title: row.get("title"),
                text: body,
                fingerprint: computed,
                language: row.get("language"),
                ingested_at: DateTime::from_timestamp(ingested_at, 0).unwrap_or_else(Utc::now),
            },
            source_path: row.get("source_path"),
        });
    }
    Ok(out)
}

pub async fn load_groups(pool: &SqlitePool) -> Result<Vec<DocumentGroup>> {
    let rows = sqlx::query("SELECT name, spec_json FROM groups ORDER BY name")
        .fetch_all(pool)
        .await?;

    let mut groups = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.get("name");
        let spec_json: String = row.get("spec_json");
        let group: DocumentGroup = serde_json::from_str(&spec_json)
            .with_context(|| format!("Corrupt group definition: {}", name))?;
        groups.push(group);
    }
    Ok(groups)
}

/// Stored artifact records. Unreadable records are skipped; the artifact
/// is rebuilt on its next request.
pub async fn load_records(pool: &SqlitePool) -> Result<Vec<ArtifactRecord>> {
    let rows = sqlx::query("SELECT id, record_json FROM artifacts ORDER BY id")
        .fetch_all(pool)
        .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get("id");
        let json: String = row.get("record_json");
        match serde_json::from_str::<ArtifactRecord>(&json) {
            Ok(record) => records.push(record),
            Err(e) => warn!(artifact = %id, error = %e, "skipping unreadable artifact record"),
        }
    }
    Ok(records)
}

/// Write every journaled change, plus the current group definitions, in
/// one transaction. Returns the number of events applied.
pub async fn flush(pool: &SqlitePool, engine: &Engine, journal: &Journal) -> Result<usize> {
    let events = journal.take();
    let mut tx = pool.begin().await?;

    let mut touched: BTreeSet<ArtifactId> = BTreeSet::new();
    for event in &events {
        match event {
            Event::DocumentAdded(doc) => {
                upsert_document(&mut tx, doc, journal.source_of(&doc.id).as_deref()).await?
            }
            Event::DocumentRemoved(id) => {
                sqlx::query("DELETE FROM documents WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            Event::ArtifactChanged(id) => {
                touched.insert(id.clone());
            }
        }
    }

    for id in &touched {
        match engine.artifact_record(id) {
            Some(record) => upsert_record(&mut tx, &record).await?,
            None => {
                sqlx::query("DELETE FROM artifacts WHERE id = ?")
                    .bind(id.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
        }
    }

    sqlx::query("DELETE FROM groups").execute(&mut *tx).await?;
    for group in engine.groups() {
        sqlx::query("INSERT INTO groups (name, spec_json) VALUES (?, ?)")
            .bind(&group.name)
            .bind(serde_json::to_string(&group)?)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    debug!(events = events.len(), artifacts = touched.len(), "journal flushed");
    Ok(events.len())
}

async fn upsert_document(
    conn: &mut SqliteConnection,
    doc: &Document,
    source_path: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (id, title, source_path, language, body, fingerprint, ingested_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            source_path = COALESCE(excluded.source_path, documents.source_path),
            language = excluded.language,
            body = excluded.body,
            fingerprint = excluded.fingerprint,
            ingested_at = excluded.ingested_at
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.title)
    .bind(source_path)
    .bind(&doc.language)
    .bind(&doc.text)
    .bind(&doc.fingerprint)
    .bind(doc.ingested_at.timestamp())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_record(conn: &mut SqliteConnection, record: &ArtifactRecord) -> Result<()> {
    let updated_at = record.updated_at.unwrap_or_else(Utc::now).timestamp();
    sqlx::query(
        r#"
        INSERT INTO artifacts (id, kind, record_json, updated_at) VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            record_json = excluded.record_json,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.id.kind())
    .bind(serde_json::to_string(record)?)
    .bind(updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiche_core::stopwords::StopwordRegistry;
    use fiche_core::IngestRequest;
    use std::sync::Arc;

    async fn memory_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::ensure_schema(&pool).await.unwrap();
        pool
    }

    fn engine_with(journal: &Arc<Journal>) -> Engine {
        Engine::builder(StopwordRegistry::builtin().resolve(&["en"]))
            .hooks(journal.clone())
            .build()
    }

    #[tokio::test]
    async fn test_flush_then_restore_roundtrip() {
        let pool = memory_pool().await;
        let journal = Arc::new(Journal::default());
        let engine = engine_with(&journal);
        journal.set_source("geo", "/notes/geo.md");
        engine
            .ingest(IngestRequest::new("geo", "Rivers carve valleys.").with_title("Geo"))
            .unwrap();
        engine.create_group(DocumentGroup::all("all")).unwrap();
        engine.summary("geo").unwrap();
        engine.card("all").unwrap();
        assert!(journal.pending() > 0);
        flush(&pool, &engine, &journal).await.unwrap();
        assert_eq!(journal.pending(), 0);

        let docs = load_documents(&pool).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_path.as_deref(), Some("/notes/geo.md"));
        assert_eq!(docs[0].document.title.as_deref(), Some("Geo"));

        let groups = load_groups(&pool).await.unwrap();
        let records = load_records(&pool).await.unwrap();
        assert_eq!(records.len(), 2);

        let restored = Engine::new(StopwordRegistry::builtin().resolve(&["en"]));
        restored
            .restore(docs.into_iter().map(|d| d.document).collect(), groups, records)
            .unwrap();
        assert_eq!(restored.summary_status("geo"), Some(ArtifactState::Fresh));
        assert_eq!(restored.card_status("all"), Some(ArtifactState::Fresh));
        assert_eq!(restored.summary("geo").unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_removed_document_and_group_are_deleted() {
        let pool = memory_pool().await;
        let journal = Arc::new(Journal::default());
        let engine = engine_with(&journal);
        engine.ingest(IngestRequest::new("a", "Magma rises.")).unwrap();
        engine.create_group(DocumentGroup::all("all")).unwrap();
        engine.card("all").unwrap();
        flush(&pool, &engine, &journal).await.unwrap();

        engine.remove("a").unwrap();
        engine.remove_group("all").unwrap();
        flush(&pool, &engine, &journal).await.unwrap();

        assert!(load_documents(&pool).await.unwrap().is_empty());
        assert!(load_groups(&pool).await.unwrap().is_empty());
        assert!(load_records(&pool).await.unwrap().is_empty());
    }

    #[test]
    fn test_sources_under_matches_directory_prefix() {
        let journal = Journal::default();
        journal.set_source("a.md", "/notes/a.md");
        journal.set_source("b.md", "/notes-old/b.md");
        journal.set_source("c.md", "/notes/sub/c.md");
        let ids: Vec<String> = journal
            .sources_under("/notes/")
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a.md", "c.md"]);
    }
}
