//! Corpus statistics and health overview for `fiche stats`.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use fiche_core::models::ArtifactId;

use crate::config::Config;
use crate::session::Session;

pub async fn run_stats(config: &Config) -> Result<()> {
    let session = Session::open(config).await?;
    let stats = session.engine.stats();
    let listing = session.engine.artifact_listing();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let summaries = listing
        .iter()
        .filter(|m| matches!(m.id, ArtifactId::Summary(_)))
        .count();
    let cards = listing.len() - summaries;
    let total_chars: usize = session
        .engine
        .documents()
        .iter()
        .map(|d| d.text.chars().count())
        .sum();
    let newest = session
        .engine
        .documents()
        .iter()
        .map(|d| d.ingested_at)
        .max();

    println!("Fiche: Corpus Stats");
    println!("===================");
    println!();
    println!("  Database:       {}", config.db.path.display());
    println!("  Size:           {}", format_bytes(db_size));
    println!();
    println!("  Documents:      {}", stats.documents);
    println!("  Characters:     {}", total_chars);
    println!("  Vocabulary:     {} terms", stats.terms);
    println!("  Stopwords:      {}", session.engine.stopwords().len());
    println!(
        "  Last ingest:    {}",
        newest
            .map(format_ago)
            .unwrap_or_else(|| "never".to_string())
    );
    println!();
    println!("  Summaries:      {}", summaries);
    println!("  Cards:          {} ({} group(s))", cards, stats.groups);
    println!(
        "  Out of date:    {} / {}",
        stats.dirty_artifacts, stats.artifacts
    );
    println!();

    session.finish().await
}

/// Database size for display, in the largest unit that keeps it above 1.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// How long ago `at` was, coarsely; older than a month prints the date.
pub fn format_ago(at: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(at);
    let plural = |n: i64| if n == 1 { "" } else { "s" };
    if elapsed < Duration::zero() || elapsed >= Duration::days(30) {
        at.format("%Y-%m-%d %H:%M").to_string()
    } else if elapsed < Duration::minutes(1) {
        "just now".to_string()
    } else if elapsed < Duration::hours(1) {
        let n = elapsed.num_minutes();
        format!("{} min{} ago", n, plural(n))
    } else if elapsed < Duration::days(1) {
        let n = elapsed.num_hours();
        format!("{} hour{} ago", n, plural(n))
    } else {
        let n = elapsed.num_days();
        format!("{} day{} ago", n, plural(n))
    }
}
