//! Ingestion pipeline orchestration.
//!
//! Turns the raw item store into the normalized schema in four stages:
//!
//! ```text
//! raw publications ──▶ publications
//! raw annotations  ──▶ reconcile (payload → vocab → annotation/continuation,
//!                                 placeholders for forward relations)
//!                  ──▶ link continuations (document order)
//!                  ──▶ remove unresolved placeholders
//! ```
//!
//! Every raw item is reconciled in its own transaction. A bad item is
//! rolled back and reported; it never stops the run. Only a storage
//! failure outside an item (connection, begin, commit) aborts.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::cleanup;
use crate::config::Config;
use crate::db;
use crate::error::{IngestError, IngestWarning};
use crate::link;
use crate::migrate::NORMALIZED_DELETE_ORDER;
use crate::models::AnnotationKind;
use crate::raw::{self, RawKind, StoredItem};
use crate::reconcile::{reconcile_annotation, reconcile_publication, retire_annotation};

/// Counts and warnings from one ingestion run.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub publications_created: u64,
    pub publications_updated: u64,
    pub annotations_created: u64,
    pub annotations_updated: u64,
    pub continuations_created: u64,
    pub continuations_existing: u64,
    pub non_lidia: u64,
    /// Rows removed because their raw item no longer carries a LIDIA payload.
    pub annotations_retired: u64,
    pub skipped: u64,
    pub failed: u64,
    pub placeholders_created: u64,
    pub continuations_linked: u64,
    pub orphans_removed: u64,
    pub placeholders_removed: u64,
    pub warnings: Vec<IngestWarning>,
}

/// CLI entry point: run the pipeline and print a summary.
pub async fn run_populate(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let report = populate(&pool).await?;

    println!("populate");
    println!(
        "  publications: {} created, {} updated",
        report.publications_created, report.publications_updated
    );
    println!(
        "  annotations: {} created, {} updated",
        report.annotations_created, report.annotations_updated
    );
    println!(
        "  continuations: {} created, {} existing, {} linked",
        report.continuations_created, report.continuations_existing, report.continuations_linked
    );
    println!(
        "  not LIDIA: {} ({} previously imported removed)",
        report.non_lidia, report.annotations_retired
    );
    println!("  skipped: {}", report.skipped);
    println!("  failed: {}", report.failed);
    println!("  orphans removed: {}", report.orphans_removed);
    println!(
        "  placeholders: {} created, {} removed",
        report.placeholders_created, report.placeholders_removed
    );
    if !report.warnings.is_empty() {
        println!("  warnings:");
        for warning in &report.warnings {
            println!("    - {}", warning);
        }
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Run the full pipeline over everything in the raw item store.
pub async fn populate(pool: &SqlitePool) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for stored in raw::list_items(pool, RawKind::Publication).await? {
        ingest_publication(pool, &stored, &mut report).await?;
    }

    for stored in raw::list_items(pool, RawKind::Annotation).await? {
        ingest_annotation(pool, &stored, &mut report).await?;
    }

    let plan = link::link_continuations(pool).await?;
    report.continuations_linked = plan.links.len() as u64;
    report.orphans_removed = plan.orphans.len() as u64;
    for (_, lidia_id) in plan.orphans {
        report
            .warnings
            .push(IngestWarning::OrphanedContinuation { lidia_id });
    }

    let removed = cleanup::remove_unresolved_placeholders(pool).await?;
    report.placeholders_removed = removed.len() as u64;
    if !removed.is_empty() {
        report.warnings.push(IngestWarning::UnresolvedPlaceholders {
            count: removed.len(),
        });
    }

    tracing::info!(
        annotations = report.annotations_created + report.annotations_updated,
        continuations = report.continuations_linked,
        skipped = report.skipped,
        failed = report.failed,
        warnings = report.warnings.len(),
        "ingestion finished"
    );

    Ok(report)
}

async fn ingest_publication(
    pool: &SqlitePool,
    stored: &StoredItem,
    report: &mut IngestReport,
) -> Result<()> {
    let item = match stored.decode() {
        Ok(item) => item,
        Err(e) => {
            record_error(report, &stored.zotero_id, e);
            return Ok(());
        }
    };

    let mut tx = pool.begin().await?;
    match reconcile_publication(&mut *tx, &item).await {
        Ok((_, upserted, warning)) => {
            tx.commit().await?;
            if upserted.created {
                report.publications_created += 1;
            } else {
                report.publications_updated += 1;
            }
            if let Some(w) = warning {
                tracing::warn!(zotero_id = %stored.zotero_id, "publication has no attachment link");
                report.warnings.push(w);
            }
        }
        Err(e) => {
            tx.rollback().await?;
            record_error(report, &stored.zotero_id, e);
        }
    }
    Ok(())
}

async fn ingest_annotation(
    pool: &SqlitePool,
    stored: &StoredItem,
    report: &mut IngestReport,
) -> Result<()> {
    let item = match stored.decode() {
        Ok(item) => item,
        Err(e) => {
            record_error(report, &stored.zotero_id, e);
            return Ok(());
        }
    };

    let mut tx = pool.begin().await?;
    match reconcile_annotation(&mut *tx, &item).await {
        Ok(outcome) => {
            tx.commit().await?;
            match (outcome.kind, outcome.created) {
                (AnnotationKind::Annotation, true) => report.annotations_created += 1,
                (AnnotationKind::Annotation, false) => report.annotations_updated += 1,
                (AnnotationKind::Continuation, true) => report.continuations_created += 1,
                (AnnotationKind::Continuation, false) => report.continuations_existing += 1,
            }
            report.placeholders_created += outcome.placeholders.len() as u64;
            for w in outcome.warnings {
                tracing::warn!("{}", w);
                report.warnings.push(w);
            }
        }
        Err(IngestError::NotLidia) => {
            tx.rollback().await?;
            retire_annotation_rows(pool, &stored.zotero_id, report).await?;
            record_error(report, &stored.zotero_id, IngestError::NotLidia);
        }
        Err(e) => {
            tx.rollback().await?;
            record_error(report, &stored.zotero_id, e);
        }
    }
    Ok(())
}

/// An item that stopped being LIDIA takes its earlier rows with it.
async fn retire_annotation_rows(
    pool: &SqlitePool,
    zotero_id: &str,
    report: &mut IngestReport,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    match retire_annotation(&mut *tx, zotero_id).await {
        Ok(removed) => {
            tx.commit().await?;
            if !removed.is_empty() {
                tracing::info!(zotero_id, lidia_ids = ?removed, "removed annotation no longer marked LIDIA");
                report.annotations_retired += removed.len() as u64;
            }
        }
        Err(e) => {
            tx.rollback().await?;
            record_error(report, zotero_id, e);
        }
    }
    Ok(())
}

fn record_error(report: &mut IngestReport, zotero_id: &str, error: IngestError) {
    match error {
        IngestError::NotLidia => {
            tracing::info!(zotero_id, "ignoring annotation: not a LIDIA annotation");
            report.non_lidia += 1;
        }
        e if e.is_skip() => {
            tracing::warn!(zotero_id, error = %e, "skipping item");
            report.skipped += 1;
            report.warnings.push(IngestWarning::SkippedItem {
                zotero_id: zotero_id.to_string(),
                reason: e.to_string(),
            });
        }
        e => {
            tracing::warn!(zotero_id, error = %e, "item failed; rolled back");
            report.failed += 1;
            report.warnings.push(IngestWarning::FailedItem {
                zotero_id: zotero_id.to_string(),
                reason: e.to_string(),
            });
        }
    }
}

/// Delete every normalized entity. Raw items and the library version stay.
pub async fn reset(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for table in NORMALIZED_DELETE_ORDER {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    tracing::info!("normalized tables cleared");
    Ok(())
}

pub async fn run_reset(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    reset(&pool).await?;
    println!("Normalized data removed. Run `lidia populate` to rebuild it.");
    pool.close().await;
    Ok(())
}
