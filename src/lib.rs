//! # LIDIA Browser
//!
//! Imports LIDIA linguistic annotations from a Zotero library and reconciles
//! them into a normalized SQLite schema for browsing and curation.
//!
//! LIDIA annotations are ordinary PDF highlights in Zotero whose comment
//! carries a small YAML description (argument name, language, relation to
//! another annotation, term groups). An argument may span several
//! highlights: the first is the annotation, the rest are continuations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────────────────────┐
//! │  Zotero  │──▶│ raw items  │──▶│ reconcile ─▶ link ─▶ cleanup │
//! │ Web API  │   │  (SQLite)  │   │   (one transaction / item)   │
//! └──────────┘   └────────────┘   └──────────────┬───────────────┘
//!     fetch                          populate    ▼
//!                                        normalized tables ──▶ list / show
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lidia init                 # create database
//! lidia fetch                # download changed items from Zotero
//! lidia populate             # rebuild annotations from raw items
//! lidia list                 # browse annotations
//! lidia show <lidia_id>      # one annotation with term groups
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Per-item errors and run warnings |
//! | [`languages`] | ISO 639-3 language names |
//! | [`payload`] | LIDIA comment decoding |
//! | [`upsert`] | Create-or-update by natural key |
//! | [`vocab`] | Shared vocabulary resolution |
//! | [`reconcile`] | Per-item annotation reconciliation |
//! | [`link`] | Continuation linking |
//! | [`cleanup`] | Placeholder removal |
//! | [`ingest`] | Pipeline orchestration and reset |
//! | [`raw`] | Raw item store |
//! | [`zotero`] | Remote library client |
//! | [`sync`] | Fetch from the remote library |
//! | [`get`] | Annotation views and page ranges |
//! | [`stats`] | Row counts and library versions |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod get;
pub mod ingest;
pub mod languages;
pub mod link;
pub mod migrate;
pub mod models;
pub mod payload;
pub mod raw;
pub mod reconcile;
pub mod stats;
pub mod sync;
pub mod upsert;
pub mod vocab;
pub mod zotero;
