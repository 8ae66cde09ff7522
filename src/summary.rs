//! `fiche summary`: print or save a document's summary.

use std::path::Path;

use anyhow::{Context, Result};
use fiche_core::models::{ArtifactId, ArtifactState};

use crate::config::Config;
use crate::session::Session;

pub async fn run_summary(config: &Config, id: &str, out: Option<&Path>) -> Result<()> {
    let session = Session::open(config).await?;
    let summary = session.engine.summary(id)?;

    if session.engine.summary_status(id) == Some(ArtifactState::Dirty) {
        let reason = session
            .engine
            .artifact_error(&ArtifactId::Summary(id.to_string()))
            .unwrap_or_default();
        eprintln!(
            "warning: summary of {} could not be regenerated, showing version {} ({})",
            id, summary.version, reason
        );
    }

    let markdown = summary.to_markdown();
    match out {
        Some(path) => {
            write_markdown(path, &markdown)?;
            println!("Wrote summary v{} to {}", summary.version, path.display());
        }
        None => print!("{}", markdown),
    }

    session.finish().await
}

/// Write a Markdown artifact, creating parent directories.
pub fn write_markdown(path: &Path, markdown: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, markdown).with_context(|| format!("Failed to write {}", path.display()))
}
