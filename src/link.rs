//! Continuation linking.
//!
//! After every item is reconciled, all annotation rows are walked in
//! document order, `(parent publication, sort index)`. The most recent full
//! annotation in the current publication owns every continuation that
//! follows it. A continuation with no preceding annotation in its
//! publication is orphaned and removed once the scan is complete.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::models::{AnnotationKind, SortIndex};

/// The positional shape shared by both annotation variants.
#[derive(Debug, Clone)]
pub struct PositionedRow {
    pub id: i64,
    pub lidia_id: String,
    pub kind: AnnotationKind,
    pub parent_attachment: Option<String>,
    pub sort_index: SortIndex,
    /// Placeholders have no raw item and no position; they never own continuations.
    pub placeholder: bool,
}

/// Links and deletions decided by one scan.
#[derive(Debug, Default, PartialEq)]
pub struct LinkPlan {
    /// `(continuation id, owning annotation id)`
    pub links: Vec<(i64, i64)>,
    /// `(continuation id, lidia id)`
    pub orphans: Vec<(i64, String)>,
}

/// Decide owners for continuations. `rows` must already be in document order.
pub fn plan_links(rows: &[PositionedRow]) -> LinkPlan {
    let mut plan = LinkPlan::default();
    let mut owner: Option<&PositionedRow> = None;

    for row in rows {
        match row.kind {
            AnnotationKind::Annotation => {
                if !row.placeholder {
                    owner = Some(row);
                }
            }
            AnnotationKind::Continuation => match owner {
                Some(o) if o.parent_attachment == row.parent_attachment => {
                    plan.links.push((row.id, o.id));
                }
                _ => plan.orphans.push((row.id, row.lidia_id.clone())),
            },
        }
    }
    plan
}

/// Load every annotation row in document order.
pub async fn load_positions(pool: &SqlitePool) -> Result<Vec<PositionedRow>> {
    let rows = sqlx::query(
        r#"
        SELECT id, lidia_id, kind, parent_attachment, sort_index, zotero_annotation
        FROM base_annotations
        ORDER BY parent_attachment, sort_index, kind, lidia_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<PositionedRow> {
            let kind: String = row.get("kind");
            let zotero_annotation: Option<String> = row.get("zotero_annotation");
            Ok(PositionedRow {
                id: row.get("id"),
                lidia_id: row.get("lidia_id"),
                kind: kind.parse().map_err(anyhow::Error::msg)?,
                parent_attachment: row.get("parent_attachment"),
                sort_index: SortIndex::new(row.get::<String, _>("sort_index")),
                placeholder: zotero_annotation.is_none(),
            })
        })
        .collect()
}

/// Run the linker and persist its plan in one transaction.
///
/// Returns the plan so the caller can report links and orphans.
pub async fn link_continuations(pool: &SqlitePool) -> Result<LinkPlan> {
    let rows = load_positions(pool).await?;
    let plan = plan_links(&rows);

    let mut tx = pool.begin().await?;
    for (continuation_id, owner_id) in &plan.links {
        sqlx::query("UPDATE continuation_annotations SET start_annotation_id = ? WHERE base_id = ?")
            .bind(*owner_id)
            .bind(*continuation_id)
            .execute(&mut *tx)
            .await?;
    }
    for (continuation_id, lidia_id) in &plan.orphans {
        tracing::warn!(lidia_id = %lidia_id, "removing orphaned continuation: no preceding annotation in publication");
        sqlx::query("DELETE FROM base_annotations WHERE id = ?")
            .bind(*continuation_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        id: i64,
        kind: AnnotationKind,
        publication: Option<&str>,
        sort_index: &str,
    ) -> PositionedRow {
        PositionedRow {
            id,
            lidia_id: format!("L{}", id),
            kind,
            parent_attachment: publication.map(str::to_string),
            sort_index: SortIndex::new(sort_index),
            placeholder: false,
        }
    }

    #[test]
    fn test_continuations_follow_latest_annotation() {
        let rows = vec![
            row(1, AnnotationKind::Annotation, Some("A"), "00001|000001|00001"),
            row(2, AnnotationKind::Continuation, Some("A"), "00002|000001|00001"),
            row(3, AnnotationKind::Annotation, Some("A"), "00003|000001|00001"),
            row(4, AnnotationKind::Continuation, Some("A"), "00004|000001|00001"),
            row(5, AnnotationKind::Continuation, Some("A"), "00005|000001|00001"),
        ];
        let plan = plan_links(&rows);
        assert_eq!(plan.links, vec![(2, 1), (4, 3), (5, 3)]);
        assert!(plan.orphans.is_empty());
    }

    #[test]
    fn test_owner_resets_on_publication_change() {
        let rows = vec![
            row(1, AnnotationKind::Annotation, Some("A"), "00001|000001|00001"),
            row(2, AnnotationKind::Continuation, Some("B"), "00000|000001|00001"),
            row(3, AnnotationKind::Annotation, Some("B"), "00002|000001|00001"),
            row(4, AnnotationKind::Continuation, Some("B"), "00003|000001|00001"),
        ];
        let plan = plan_links(&rows);
        assert_eq!(plan.links, vec![(4, 3)]);
        assert_eq!(plan.orphans, vec![(2, "L2".to_string())]);
    }

    #[test]
    fn test_placeholder_never_owns() {
        let mut placeholder = row(1, AnnotationKind::Annotation, None, "");
        placeholder.placeholder = true;
        let rows = vec![
            placeholder,
            row(2, AnnotationKind::Continuation, None, "00001|000001|00001"),
        ];
        let plan = plan_links(&rows);
        assert!(plan.links.is_empty());
        assert_eq!(plan.orphans.len(), 1);
    }
}
