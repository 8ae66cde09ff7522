//! # Fiche
//!
//! A local-first corpus of study documents with extractive summaries and
//! four-section revision cards that are kept in sync as documents change.
//!
//! The weighting and synchronization engine lives in `fiche-core`; this
//! crate adds the CLI surface: configuration, SQLite persistence, file
//! extraction, and reports.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌────────────────────┐   ┌──────────┐
//! │ add / sync │──▶│  extract   │──▶│ fiche_core::Engine │──▶│ Journal  │──▶ SQLite
//! └────────────┘   └────────────┘   └─────────┬──────────┘   └──────────┘
//!                                             │
//!                             summary / card / status / report
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`store`] | Journal of engine events, load and flush |
//! | [`session`] | Engine rebuilt from the database for one command |
//! | [`extract`] | Text extraction by file type |
//! | [`ingest`] | `add`, `add-text`, `sync`, `remove` |
//! | [`documents`] | `list`, `terms` |
//! | [`summary`] | `summary` |
//! | [`card`] | `card create/show/remove` |
//! | [`status`] | `status` |
//! | [`report`] | CSV reports |
//! | [`stats`] | `stats` |

pub mod card;
pub mod config;
pub mod db;
pub mod documents;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod report;
pub mod session;
pub mod stats;
pub mod status;
pub mod store;
pub mod summary;
