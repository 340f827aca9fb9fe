//! Database statistics.
//!
//! A quick summary of what is stored: raw item counts, normalized row counts
//! and the library version reached by the last fetch. Used by `lidia stats`
//! to confirm that fetch and populate did what was expected.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::raw::{self, RawKind};

/// Tables reported by `lidia stats`, with their display labels.
const COUNTED_TABLES: &[(&str, &str)] = &[
    ("publications", "Publications"),
    ("languages", "Languages"),
    ("annotations", "Annotations"),
    ("continuation_annotations", "Continuations"),
    ("term_groups", "Term groups"),
    ("article_terms", "Article terms"),
    ("categories", "Categories"),
    ("lidia_terms", "Lexicon terms"),
];

/// Row count for each normalized table, in display order.
pub async fn table_counts(pool: &SqlitePool) -> Result<Vec<(&'static str, i64)>> {
    let mut counts = Vec::with_capacity(COUNTED_TABLES.len());
    for (table, _) in COUNTED_TABLES {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await?;
        counts.push((*table, count));
    }
    Ok(counts)
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let raw_publications = raw::count_items(&pool, RawKind::Publication).await?;
    let raw_annotations = raw::count_items(&pool, RawKind::Annotation).await?;
    let counts = table_counts(&pool).await?;
    let versions = raw::library_versions(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("LIDIA Browser — Database Stats");
    println!("==============================");
    println!();
    println!("  Database:         {}", config.db.path.display());
    println!("  Size:             {}", format_bytes(db_size));
    println!();
    println!("  Raw publications: {}", raw_publications);
    println!("  Raw annotations:  {}", raw_annotations);
    println!();
    for ((_, label), (_, count)) in COUNTED_TABLES.iter().zip(&counts) {
        println!("  {:<17} {}", format!("{}:", label), count);
    }

    if !versions.is_empty() {
        println!();
        println!("  {:<16} {:>8}   {}", "LIBRARY", "VERSION", "LAST FETCH");
        println!("  {}", "-".repeat(48));
        for (library_id, version, updated_at) in &versions {
            println!(
                "  {:<16} {:>8}   {}",
                library_id,
                version,
                format_ts_iso(*updated_at)
            );
        }
    }
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
