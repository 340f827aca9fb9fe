//! Removal of relation placeholders that no real item ever filled in.

use anyhow::Result;
use sqlx::SqlitePool;

/// Delete every annotation without a raw item link and return their lidia ids.
///
/// Relations pointing at a removed placeholder fall back to null through
/// the `relation_to_id` delete rule.
pub async fn remove_unresolved_placeholders(pool: &SqlitePool) -> Result<Vec<String>> {
    let mut tx = pool.begin().await?;

    let lidia_ids: Vec<String> = sqlx::query_scalar(
        "SELECT lidia_id FROM base_annotations WHERE kind = 'annotation' AND zotero_annotation IS NULL ORDER BY lidia_id",
    )
    .fetch_all(&mut *tx)
    .await?;

    if !lidia_ids.is_empty() {
        tracing::warn!(
            count = lidia_ids.len(),
            "removing annotation placeholders never matched by an imported annotation"
        );
        sqlx::query(
            "DELETE FROM base_annotations WHERE kind = 'annotation' AND zotero_annotation IS NULL",
        )
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(lidia_ids)
}
