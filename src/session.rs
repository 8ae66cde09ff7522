//! One CLI invocation's view of the corpus.
//!
//! Every command that touches the corpus opens a [`Session`], which
//! rebuilds the engine from the database, and calls [`Session::finish`] to
//! write back what changed.

use std::sync::Arc;

use anyhow::{Context, Result};
use fiche_core::stopwords::StopwordRegistry;
use fiche_core::Engine;
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::store::{self, Journal};

pub struct Session {
    pub engine: Engine,
    pub journal: Arc<Journal>,
    pool: SqlitePool,
}

impl Session {
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::ensure_schema(&pool).await?;

        let stopwords = StopwordRegistry::from_dir(config.stopwords.dir.as_deref())
            .resolve(config.stopwords.languages.as_slice());
        let journal = Arc::new(Journal::default());
        let engine = Engine::builder(stopwords)
            .summaries(config.summary)
            .cards(config.card)
            .hooks(journal.clone())
            .build();

        let stored = store::load_documents(&pool).await?;
        let groups = store::load_groups(&pool).await?;
        let records = store::load_records(&pool).await?;

        let mut documents = Vec::with_capacity(stored.len());
        for s in stored {
            if let Some(path) = s.source_path {
                journal.set_source(&s.document.id, path);
            }
            documents.push(s.document);
        }
        engine
            .restore(documents, groups, records)
            .context("Failed to restore corpus from database")?;
        debug!(pending = journal.pending(), "session opened");

        Ok(Self {
            engine,
            journal,
            pool,
        })
    }

    /// Persist the session's changes and close the database.
    pub async fn finish(self) -> Result<()> {
        store::flush(&self.pool, &self.engine, &self.journal).await?;
        self.pool.close().await;
        Ok(())
    }
}
