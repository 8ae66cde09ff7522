//! `fiche card`: define document groups and render their revision cards.

use std::path::Path;

use anyhow::{bail, Result};
use fiche_core::models::{ArtifactId, ArtifactState, DocumentGroup};

use crate::config::Config;
use crate::session::Session;
use crate::summary::write_markdown;

/// Group definition from the `card create` flags. Exactly one of
/// `docs`, `theme` and `all` must be set.
pub fn group_from_flags(
    name: &str,
    docs: Option<Vec<String>>,
    theme: Option<String>,
    all: bool,
) -> Result<DocumentGroup> {
    match (docs, theme, all) {
        (Some(ids), None, false) => {
            let ids: Vec<String> = ids
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
            Ok(DocumentGroup::documents(name, ids))
        }
        (None, Some(theme), false) => Ok(DocumentGroup::theme(name, theme)),
        (None, None, true) => Ok(DocumentGroup::all(name)),
        _ => bail!("Specify exactly one of --docs, --theme or --all"),
    }
}

pub async fn run_card_create(
    config: &Config,
    name: &str,
    docs: Option<Vec<String>>,
    theme: Option<String>,
    all: bool,
) -> Result<()> {
    let group = group_from_flags(name, docs, theme, all)?;
    let session = Session::open(config).await?;
    session.engine.create_group(group)?;

    let members = session.engine.group_members(name)?;
    println!("card {} ({} document(s))", name, members.len());
    for id in &members {
        println!("  - {}", id);
    }

    session.finish().await
}

pub async fn run_card_show(config: &Config, name: &str, out: Option<&Path>) -> Result<()> {
    let session = Session::open(config).await?;
    let card = session.engine.card(name)?;

    if session.engine.card_status(name) == Some(ArtifactState::Dirty) {
        let reason = session
            .engine
            .artifact_error(&ArtifactId::Card(name.to_string()))
            .unwrap_or_default();
        eprintln!(
            "warning: card {} could not be regenerated, showing version {} ({})",
            name, card.version, reason
        );
    }

    let markdown = card.to_markdown();
    match out {
        Some(path) => {
            write_markdown(path, &markdown)?;
            println!("Wrote card v{} to {}", card.version, path.display());
        }
        None => print!("{}", markdown),
    }

    session.finish().await
}

pub async fn run_card_remove(config: &Config, name: &str) -> Result<()> {
    let session = Session::open(config).await?;
    session.engine.remove_group(name)?;
    println!("removed card {}", name);
    session.finish().await
}
