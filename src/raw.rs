//! Storage for items exactly as fetched from the remote library, plus the
//! library version the last fetch reached.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::error::IngestError;
use crate::models::RawItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Publication,
    Annotation,
}

impl RawKind {
    fn table(&self) -> &'static str {
        match self {
            RawKind::Publication => "raw_publications",
            RawKind::Annotation => "raw_annotations",
        }
    }
}

/// A stored row whose JSON has not been decoded yet.
#[derive(Debug, Clone)]
pub struct StoredItem {
    pub zotero_id: String,
    pub content: String,
}

impl StoredItem {
    pub fn decode(&self) -> Result<RawItem, IngestError> {
        let content = serde_json::from_str(&self.content)
            .map_err(|e| IngestError::MalformedPayload(format!("stored JSON: {}", e)))?;
        Ok(RawItem {
            zotero_id: self.zotero_id.clone(),
            content,
        })
    }
}

/// Insert or replace a remote item, keyed by its `key` field.
///
/// Returns `true` when the item was new.
pub async fn upsert_item(pool: &SqlitePool, kind: RawKind, item: &Value) -> Result<bool> {
    let key = item
        .get("key")
        .and_then(Value::as_str)
        .context("remote item has no 'key' field")?;

    let table = kind.table();
    let existing: Option<String> =
        sqlx::query_scalar(&format!("SELECT zotero_id FROM {} WHERE zotero_id = ?", table))
            .bind(key)
            .fetch_optional(pool)
            .await?;

    let now = chrono::Utc::now().timestamp();
    sqlx::query(&format!(
        r#"
        INSERT INTO {} (zotero_id, content, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(zotero_id) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at
        "#,
        table
    ))
    .bind(key)
    .bind(item.to_string())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(existing.is_none())
}

/// All stored items of one kind, ordered by key.
pub async fn list_items(pool: &SqlitePool, kind: RawKind) -> Result<Vec<StoredItem>> {
    let rows: Vec<(String, String)> = sqlx::query_as(&format!(
        "SELECT zotero_id, content FROM {} ORDER BY zotero_id",
        kind.table()
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(zotero_id, content)| StoredItem { zotero_id, content })
        .collect())
}

pub async fn count_items(pool: &SqlitePool, kind: RawKind) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", kind.table()))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Last synced library version, or `-1` when the library was never fetched.
pub async fn get_library_version(pool: &SqlitePool, library_id: &str) -> Result<i64> {
    let version: Option<i64> =
        sqlx::query_scalar("SELECT library_version FROM sync_state WHERE library_id = ?")
            .bind(library_id)
            .fetch_optional(pool)
            .await?;
    Ok(version.unwrap_or(-1))
}

pub async fn set_library_version(pool: &SqlitePool, library_id: &str, version: i64) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO sync_state (library_id, library_version, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(library_id) DO UPDATE SET library_version = excluded.library_version, updated_at = excluded.updated_at
        "#,
    )
    .bind(library_id)
    .bind(version)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Every stored library version, for stats output.
pub async fn library_versions(pool: &SqlitePool) -> Result<Vec<(String, i64, i64)>> {
    let rows = sqlx::query_as(
        "SELECT library_id, library_version, updated_at FROM sync_state ORDER BY library_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
