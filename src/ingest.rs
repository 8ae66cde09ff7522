//! Getting documents into the corpus: single files, raw text, and whole
//! directories.
//!
//! `sync` walks a directory with include/exclude globs, ingests every
//! supported file under an id equal to its relative path, and removes
//! documents previously synced from that directory whose file is gone.
//! A file whose id already belongs to a document from another directory,
//! or to one added by hand, is skipped.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fiche_core::{Error, IngestOutcome, IngestRequest};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::extract;
use crate::session::Session;

const UNTITLED: &str = "Untitled document";
const MAX_TITLE_CHARS: usize = 80;

/// Document id for a file: its stem, lowercased, with every run of
/// non-alphanumeric characters collapsed to `-`.
pub fn document_id_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let mut id = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_alphanumeric() {
            id.push(c);
        } else if !id.ends_with('-') {
            id.push('-');
        }
    }
    let id = id.trim_matches('-');
    if id.is_empty() {
        "document".to_string()
    } else {
        id.to_string()
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_default();
    let title = collapse_whitespace(&stem);
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    }
}

/// First non-blank line of `text`, cut to 80 characters.
pub fn title_from_text(text: &str) -> String {
    let line = text
        .lines()
        .map(collapse_whitespace)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    let title: String = line.chars().take(MAX_TITLE_CHARS).collect();
    let title = title.trim_end().to_string();
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    }
}

fn outcome_label(outcome: IngestOutcome) -> &'static str {
    match outcome {
        IngestOutcome::Added => "added",
        IngestOutcome::Updated => "updated",
        IngestOutcome::Unchanged => "unchanged",
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).with_context(|| format!("No such file: {}", path.display()))
}

/// `fiche add`: ingest files, each under its slugged stem (or `id`).
pub async fn run_add(
    config: &Config,
    paths: &[PathBuf],
    language: Option<String>,
    id: Option<String>,
) -> Result<()> {
    if paths.is_empty() {
        bail!("No files given");
    }
    if id.is_some() && paths.len() > 1 {
        bail!("--id can only be used with a single file");
    }

    // Extract everything first so a bad file aborts before any change.
    let mut requests = Vec::with_capacity(paths.len());
    for path in paths {
        let path = canonical(path)?;
        let text = extract::extract_file(&path)?;
        let doc_id = id.clone().unwrap_or_else(|| document_id_for(&path));
        let mut request = IngestRequest::new(&doc_id, text).with_title(title_from_path(&path));
        request.language = language.clone();
        requests.push((path, request));
    }

    let session = Session::open(config).await?;
    for (path, request) in requests {
        let doc_id = request.id.clone();
        session
            .journal
            .set_source(&doc_id, path.to_string_lossy().to_string());
        let outcome = session
            .engine
            .ingest(request)
            .with_context(|| format!("Failed to ingest {}", path.display()))?;
        println!("{} {} ({})", outcome_label(outcome), doc_id, path.display());
    }
    session.finish().await
}

/// `fiche add-text`: ingest text given on the command line.
pub async fn run_add_text(
    config: &Config,
    text: &str,
    title: Option<String>,
    language: Option<String>,
    id: Option<String>,
) -> Result<()> {
    let doc_id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let title = title
        .map(|t| collapse_whitespace(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| title_from_text(text));
    let mut request = IngestRequest::new(&doc_id, text).with_title(title);
    request.language = language;

    let session = Session::open(config).await?;
    let outcome = session.engine.ingest(request)?;
    println!("{} {}", outcome_label(outcome), doc_id);
    session.finish().await
}

/// Remove a document and its summary, if one was ever generated.
fn remove_with_summary(session: &Session, id: &str) -> Result<()> {
    session.engine.remove(id)?;
    match session.engine.forget_summary(id) {
        Ok(()) | Err(Error::NotFound { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// `fiche remove`: drop a document and its summary.
pub async fn run_remove(config: &Config, id: &str) -> Result<()> {
    let session = Session::open(config).await?;
    remove_with_summary(&session, id)?;
    println!("removed {}", id);
    session.finish().await
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub scanned: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub removed: usize,
}

/// Files under `root` matching the sync globs, as `(relative id, path)`,
/// sorted by id.
pub fn scan_directory(config: &Config, root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let include_set = build_globset(&config.sync.include_globs)?;

    let mut excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    excludes.extend(config.sync.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(config.sync.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        if !extract::is_supported(path) {
            continue;
        }
        files.push((rel_str, path.to_path_buf()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// `fiche sync`: mirror a directory into the corpus.
pub async fn run_sync(config: &Config, dir: &Path) -> Result<()> {
    let root = canonical(dir)?;
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }
    let files = scan_directory(config, &root)?;

    let session = Session::open(config).await?;
    let mut report = SyncReport {
        scanned: files.len(),
        ..SyncReport::default()
    };
    let mut seen = BTreeSet::new();
    let root_str = root.to_string_lossy().to_string();
    let root_prefix = format!("{}/", root_str.trim_end_matches('/'));

    for (doc_id, path) in &files {
        if session.engine.contains(doc_id) {
            let owner = session.journal.source_of(doc_id);
            if !owner.as_deref().is_some_and(|p| p.starts_with(&root_prefix)) {
                warn!(
                    file = %path.display(),
                    id = %doc_id,
                    owner = owner.as_deref().unwrap_or("-"),
                    "id already taken by a document from elsewhere, skipping"
                );
                report.skipped += 1;
                continue;
            }
        }

        let text = match extract::extract_file(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping file");
                report.skipped += 1;
                continue;
            }
        };
        if text.trim().is_empty() {
            warn!(file = %path.display(), "no text extracted, skipping");
            report.skipped += 1;
            continue;
        }

        seen.insert(doc_id.clone());
        session
            .journal
            .set_source(doc_id, path.to_string_lossy().to_string());
        let request = IngestRequest::new(doc_id, text).with_title(title_from_path(path));
        match session.engine.ingest(request)? {
            IngestOutcome::Added => report.added += 1,
            IngestOutcome::Updated => report.updated += 1,
            IngestOutcome::Unchanged => report.unchanged += 1,
        }
    }

    for (doc_id, path) in session.journal.sources_under(&root_str) {
        if seen.contains(&doc_id) || Path::new(&path).exists() {
            continue;
        }
        remove_with_summary(&session, &doc_id)?;
        info!(id = %doc_id, "source file gone, document removed");
        report.removed += 1;
    }

    println!("sync {}", root.display());
    println!("  scanned: {} files", report.scanned);
    println!("  added: {}", report.added);
    println!("  updated: {}", report.updated);
    println!("  unchanged: {}", report.unchanged);
    println!("  skipped: {}", report.skipped);
    println!("  removed: {}", report.removed);
    println!("ok");

    session.finish().await
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
