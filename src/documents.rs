//! `fiche list`, `fiche terms` and `fiche select`.

use anyhow::Result;
use fiche_core::select::Budget;

use crate::config::Config;
use crate::session::Session;

pub async fn run_list(config: &Config) -> Result<()> {
    let session = Session::open(config).await?;
    let documents = session.engine.documents();

    if documents.is_empty() {
        println!("No documents. Add some with `fiche add <files>`.");
    } else {
        println!("{:<32} {:>8} {:<5} TITLE", "ID", "CHARS", "LANG");
        for doc in &documents {
            println!(
                "{:<32} {:>8} {:<5} {}",
                doc.id,
                doc.text.chars().count(),
                doc.language.as_deref().unwrap_or("-"),
                doc.display_title()
            );
        }
        println!();
        println!("{} document(s)", documents.len());
    }

    session.finish().await
}

/// Print the `k` highest-weighted terms of a document.
pub async fn run_terms(config: &Config, id: &str, k: usize) -> Result<()> {
    let session = Session::open(config).await?;
    let terms = session.engine.top_terms(id, k)?;

    println!("Top terms for {}", id);
    for (rank, (term, weight)) in terms.iter().enumerate() {
        println!("  {:>2}. {:<24} {:.4}", rank + 1, term, weight);
    }

    session.finish().await
}

/// Print the best-ranked sentences of `ids` that fit `budget`.
pub async fn run_select(config: &Config, ids: &[String], budget: Budget) -> Result<()> {
    let session = Session::open(config).await?;
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    let spans = session.engine.select(&ids, budget)?;

    for scored in &spans {
        let cut = if scored.truncated { " (cut)" } else { "" };
        println!(
            "[{} #{}] {:.4}{}",
            scored.span.document_id, scored.span.position, scored.score, cut
        );
        println!("  {}", scored.span.text);
    }
    println!();
    println!("{} span(s)", spans.len());

    session.finish().await
}
