//! `fiche report`: CSV listings of summaries and cards.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fiche_core::models::{ArtifactId, ArtifactMeta};
use fiche_core::Engine;

use crate::config::Config;
use crate::session::Session;

/// Quote a CSV field when it contains a delimiter, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn version_field(meta: &ArtifactMeta) -> String {
    meta.version.map(|v| v.to_string()).unwrap_or_default()
}

fn updated_field(meta: &ArtifactMeta) -> String {
    meta.updated_at
        .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_default()
}

pub fn summaries_csv(engine: &Engine) -> String {
    let mut lines = vec!["document_id,title,version,state,updated_at".to_string()];
    for meta in engine.artifact_listing() {
        let ArtifactId::Summary(doc_id) = &meta.id else {
            continue;
        };
        let title = engine
            .document(doc_id)
            .map(|d| d.display_title().to_string())
            .unwrap_or_default();
        lines.push(csv_row(&[
            doc_id.clone(),
            title,
            version_field(&meta),
            meta.state.to_string(),
            updated_field(&meta),
        ]));
    }
    lines.join("\r\n") + "\r\n"
}

pub fn cards_csv(engine: &Engine) -> String {
    let mut lines = vec!["name,sources,version,state,updated_at".to_string()];
    for meta in engine.artifact_listing() {
        let ArtifactId::Card(name) = &meta.id else {
            continue;
        };
        lines.push(csv_row(&[
            name.clone(),
            meta.sources.join(";"),
            version_field(&meta),
            meta.state.to_string(),
            updated_field(&meta),
        ]));
    }
    lines.join("\r\n") + "\r\n"
}

fn write_report(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub async fn run_report(config: &Config) -> Result<()> {
    let session = Session::open(config).await?;
    let dir = &config.reports.dir;
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let summaries = write_report(dir, "summaries.csv", &summaries_csv(&session.engine))?;
    let cards = write_report(dir, "cards.csv", &cards_csv(&session.engine))?;
    println!("Wrote {}", summaries.display());
    println!("Wrote {}", cards.display());

    session.finish().await
}
