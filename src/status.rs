//! `fiche status`: freshness of every summary and card.

use anyhow::Result;
use fiche_core::models::ArtifactState;

use crate::config::Config;
use crate::session::Session;
use crate::stats::format_ago;

pub async fn run_status(config: &Config) -> Result<()> {
    let session = Session::open(config).await?;
    let listing = session.engine.artifact_listing();

    if listing.is_empty() {
        println!("No summaries or cards generated yet.");
    } else {
        println!(
            "{:<40} {:<13} {:>7} {:>7}   {}",
            "ARTIFACT", "STATE", "VERSION", "SOURCES", "UPDATED"
        );
        println!("{}", "-".repeat(84));
        for meta in &listing {
            let version = meta
                .version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            let updated = meta
                .updated_at
                .map(format_ago)
                .unwrap_or_else(|| "never".to_string());
            println!(
                "{:<40} {:<13} {:>7} {:>7}   {}",
                meta.id.to_string(),
                meta.state.to_string(),
                version,
                meta.sources.len(),
                updated
            );
            if let Some(err) = session.engine.artifact_error(&meta.id) {
                println!("    last error: {}", err);
            }
        }

        let dirty = listing
            .iter()
            .filter(|m| m.state != ArtifactState::Fresh)
            .count();
        println!();
        println!("{} artifact(s), {} out of date", listing.len(), dirty);
    }

    session.finish().await
}
