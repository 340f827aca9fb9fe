//! Fetch stage: copy changed items from the remote library into the raw
//! item store.
//!
//! The local library version is compared with the remote one; only when the
//! remote is newer are publications and annotations modified since the local
//! version downloaded. The new version is stored after both lists were saved,
//! so an interrupted fetch is simply repeated next time.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::raw::{self, RawKind};
use crate::zotero::{RemoteLibrary, ZoteroClient};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub local_version: i64,
    pub remote_version: i64,
    pub up_to_date: bool,
    pub publications_created: u64,
    pub publications_updated: u64,
    pub annotations_created: u64,
    pub annotations_updated: u64,
}

/// CLI entry point for `lidia fetch`.
pub async fn run_fetch(config: &Config, full: bool) -> Result<()> {
    let zotero = config
        .zotero
        .as_ref()
        .context("No [zotero] section in config; cannot fetch")?;
    let client = ZoteroClient::new(zotero)?;
    let pool = db::connect(config).await?;

    let report = fetch(&pool, &client, full).await?;

    println!("fetch {}", client.library_id());
    println!("  remote version: {}", report.remote_version);
    if report.local_version < 0 {
        println!("  local version: (none)");
    } else {
        println!("  local version: {}", report.local_version);
    }
    if report.up_to_date {
        println!("  local library up to date; nothing fetched");
    } else {
        println!(
            "  publications: {} added, {} updated",
            report.publications_created, report.publications_updated
        );
        println!(
            "  annotations: {} added, {} updated",
            report.annotations_created, report.annotations_updated
        );
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Download items changed since the stored library version.
///
/// With `full`, the stored version is ignored and everything is fetched.
pub async fn fetch(
    pool: &SqlitePool,
    library: &dyn RemoteLibrary,
    full: bool,
) -> Result<FetchReport> {
    let library_id = library.library_id().to_string();
    let remote_version = library.last_modified_version().await?;
    let local_version = raw::get_library_version(pool, &library_id).await?;

    tracing::info!(remote_version, local_version, "checking library version");

    let mut report = FetchReport {
        local_version,
        remote_version,
        ..Default::default()
    };

    if !full && remote_version <= local_version {
        tracing::info!("local library up to date; not fetching");
        report.up_to_date = true;
        return Ok(report);
    }

    let since = if full { 0 } else { local_version.max(0) };

    for item in library.top_items(since).await? {
        if raw::upsert_item(pool, RawKind::Publication, &item).await? {
            report.publications_created += 1;
        } else {
            report.publications_updated += 1;
        }
    }
    tracing::info!(
        added = report.publications_created,
        updated = report.publications_updated,
        "publications fetched"
    );

    for item in library.annotation_items(since).await? {
        if raw::upsert_item(pool, RawKind::Annotation, &item).await? {
            report.annotations_created += 1;
        } else {
            report.annotations_updated += 1;
        }
    }
    tracing::info!(
        added = report.annotations_created,
        updated = report.annotations_updated,
        "annotations fetched"
    );

    raw::set_library_version(pool, &library_id, remote_version).await?;
    Ok(report)
}
