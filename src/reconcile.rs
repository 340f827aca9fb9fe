//! Reconciliation of single raw items into the normalized schema.
//!
//! Each function here handles exactly one raw item on a connection the
//! caller has already put inside a transaction; the ingestion driver owns
//! commit and rollback.
//!
//! Annotations are upserted by `lidia_id`. A `relationTo` that names an
//! annotation not seen yet creates a placeholder row carrying only the
//! `lidia_id`; the real item later updates that row in place, and any
//! placeholder still unmatched after the run is removed by
//! [`cleanup`](crate::cleanup).

use sqlx::{Row, SqliteConnection};

use crate::error::{IngestError, IngestWarning};
use crate::models::{
    Annotation, AnnotationKind, BaseFields, Continuation, LidiaRecord, Publication, RawItem,
    TermGroupEntry,
};
use crate::payload::{parse_annotation_item, parse_publication_item};
use crate::upsert::{Upsert, Upserted};
use crate::vocab;

/// What happened to one annotation item.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub lidia_id: String,
    pub kind: AnnotationKind,
    pub created: bool,
    /// Lidia ids of placeholders created for forward relations.
    pub placeholders: Vec<String>,
    pub warnings: Vec<IngestWarning>,
}

/// Create or update the publication for a raw publication item.
pub async fn reconcile_publication(
    conn: &mut SqliteConnection,
    item: &RawItem,
) -> Result<(Publication, Upserted, Option<IngestWarning>), IngestError> {
    let publication = parse_publication_item(item);
    let warning = if publication.attachment_id.is_none() {
        Some(IngestWarning::MissingAttachment {
            zotero_id: publication.zotero_id.clone(),
        })
    } else {
        None
    };

    let upserted = Upsert::new("publications")
        .key("zotero_id", publication.zotero_id.as_str())
        .field("attachment_id", publication.attachment_id.clone())
        .field("title", publication.title.clone())
        .create_or_update(conn)
        .await?;

    Ok((publication, upserted, warning))
}

/// Reconcile one raw annotation item.
pub async fn reconcile_annotation(
    conn: &mut SqliteConnection,
    item: &RawItem,
) -> Result<ReconcileOutcome, IngestError> {
    let mut record = parse_annotation_item(item)?;
    let mut warnings = Vec::new();

    let base = match &mut record {
        LidiaRecord::Annotation(a) => &mut a.base,
        LidiaRecord::Continuation(c) => &mut c.base,
    };
    if let Some(attachment_id) = base.parent_attachment.clone() {
        if !publication_exists(conn, &attachment_id).await? {
            warnings.push(IngestWarning::UnknownPublication {
                lidia_id: base.lidia_id.clone(),
                attachment_id,
            });
            base.parent_attachment = None;
        }
    }

    let kind = record.kind();
    let lidia_id = record.base().lidia_id.clone();
    if let Some(zotero_id) = record.base().zotero_annotation.as_deref() {
        release_previous_row(conn, zotero_id, &lidia_id, kind).await?;
    }

    let (created, placeholders) = match &record {
        LidiaRecord::Continuation(c) => (upsert_continuation(conn, c).await?, Vec::new()),
        LidiaRecord::Annotation(a) => upsert_annotation(conn, a, &mut warnings).await?,
    };

    tracing::debug!(
        lidia_id = %lidia_id,
        kind = kind.as_str(),
        created,
        "reconciled annotation"
    );

    Ok(ReconcileOutcome {
        lidia_id,
        kind,
        created,
        placeholders,
        warnings,
    })
}

/// Continuations are only written on creation; the linker sets their owner.
async fn upsert_continuation(
    conn: &mut SqliteConnection,
    continuation: &Continuation,
) -> Result<bool, IngestError> {
    ensure_kind(conn, &continuation.base.lidia_id, AnnotationKind::Continuation).await?;

    let base = base_upsert(&continuation.base, AnnotationKind::Continuation)
        .get_or_create(conn)
        .await?;
    Upsert::new("continuation_annotations")
        .id_column("base_id")
        .key("base_id", base.id)
        .get_or_create(conn)
        .await?;

    Ok(base.created)
}

async fn upsert_annotation(
    conn: &mut SqliteConnection,
    annotation: &Annotation,
    warnings: &mut Vec<IngestWarning>,
) -> Result<(bool, Vec<String>), IngestError> {
    ensure_kind(conn, &annotation.base.lidia_id, AnnotationKind::Annotation).await?;

    let arglang_id = vocab::resolve_language(conn, &annotation.arglang).await?;

    let mut placeholders = Vec::new();
    let mut relation_to = annotation.relation_to.as_deref();
    if let Some(target) = relation_to {
        let target_kind = existing_kind(conn, target).await?;
        if target_kind.as_deref() == Some(AnnotationKind::Continuation.as_str()) {
            warnings.push(IngestWarning::RelationToContinuation {
                lidia_id: annotation.base.lidia_id.clone(),
                target: target.to_string(),
            });
            relation_to = None;
        }
    }
    let relation_to_id = match relation_to {
        Some(target) => {
            let (id, created) = ensure_annotation_row(conn, target).await?;
            if created {
                placeholders.push(target.to_string());
            }
            Some(id)
        }
        None => None,
    };

    let base = base_upsert(&annotation.base, AnnotationKind::Annotation)
        .create_or_update(conn)
        .await?;

    Upsert::new("annotations")
        .id_column("base_id")
        .key("base_id", base.id)
        .field("argname", annotation.argname.as_str())
        .field("arglang_id", arglang_id)
        .field("description", annotation.description.as_str())
        .field("page_start", annotation.page_start.clone())
        .field("page_end", annotation.page_end.clone())
        .field("relation_type", annotation.relation_type.as_str())
        .field("relation_to_id", relation_to_id)
        .create_or_update(conn)
        .await?;

    rebuild_term_groups(conn, base.id, &annotation.termgroups).await?;

    // A placeholder created for a self-reference was just filled in.
    placeholders.retain(|p| p != &annotation.base.lidia_id);

    Ok((base.created, placeholders))
}

/// Create-or-update term groups at their positional index and drop any
/// left over from a longer previous list.
async fn rebuild_term_groups(
    conn: &mut SqliteConnection,
    annotation_id: i64,
    entries: &[TermGroupEntry],
) -> Result<(), IngestError> {
    for (idx, entry) in entries.iter().enumerate() {
        let articleterm_id = match entry.articleterm.as_deref() {
            Some(term) => Some(vocab::resolve_article_term(conn, term).await?),
            None => None,
        };
        let category_id = match entry.category.as_deref() {
            Some(category) => Some(vocab::resolve_category(conn, category).await?),
            None => None,
        };
        let lidiaterm_id = match &entry.lexiconterm {
            Some((vocab, term)) => Some(vocab::resolve_lidia_term(conn, *vocab, term).await?),
            None => None,
        };

        Upsert::new("term_groups")
            .key("annotation_id", annotation_id)
            .key("idx", idx as i64)
            .field("termtype", entry.termtype.as_str())
            .field("articleterm_id", articleterm_id)
            .field("category_id", category_id)
            .field("lidiaterm_id", lidiaterm_id)
            .create_or_update(conn)
            .await?;
    }

    sqlx::query("DELETE FROM term_groups WHERE annotation_id = ? AND idx >= ?")
        .bind(annotation_id)
        .bind(entries.len() as i64)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Get-or-create an annotation row for `lidia_id`, inserting a bare
/// placeholder when it does not exist yet.
async fn ensure_annotation_row(
    conn: &mut SqliteConnection,
    lidia_id: &str,
) -> Result<(i64, bool), IngestError> {
    ensure_kind(conn, lidia_id, AnnotationKind::Annotation).await?;

    let base = Upsert::new("base_annotations")
        .key("lidia_id", lidia_id)
        .field("kind", AnnotationKind::Annotation.as_str())
        .get_or_create(conn)
        .await?;
    Upsert::new("annotations")
        .id_column("base_id")
        .key("base_id", base.id)
        .get_or_create(conn)
        .await?;

    if base.created {
        tracing::debug!(lidia_id, "created placeholder annotation");
    }
    Ok((base.id, base.created))
}

fn base_upsert(base: &BaseFields, kind: AnnotationKind) -> Upsert {
    Upsert::new("base_annotations")
        .key("lidia_id", base.lidia_id.as_str())
        .field("kind", kind.as_str())
        .field("zotero_annotation", base.zotero_annotation.clone())
        .field("parent_attachment", base.parent_attachment.clone())
        .field("textselection", base.textselection.as_str())
        .field("sort_index", base.sort_index.as_str())
}

/// Delete the row an earlier import of this raw item left under another
/// lidia id or variant. Relations to it fall back to null, its continuations
/// are relinked by the linker.
async fn release_previous_row(
    conn: &mut SqliteConnection,
    zotero_id: &str,
    lidia_id: &str,
    kind: AnnotationKind,
) -> Result<(), IngestError> {
    let previous: Option<(i64, String, String)> = sqlx::query_as(
        "SELECT id, lidia_id, kind FROM base_annotations WHERE zotero_annotation = ?",
    )
    .bind(zotero_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((id, previous_id, previous_kind)) = previous {
        if previous_id != lidia_id || previous_kind != kind.as_str() {
            tracing::info!(
                zotero_id,
                previous = %previous_id,
                lidia_id,
                "annotation re-keyed; removing previous row"
            );
            sqlx::query("DELETE FROM base_annotations WHERE id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

/// Remove the rows of a raw item that no longer carries a LIDIA payload.
/// Returns the lidia ids removed.
pub async fn retire_annotation(
    conn: &mut SqliteConnection,
    zotero_id: &str,
) -> Result<Vec<String>, IngestError> {
    let lidia_ids: Vec<String> =
        sqlx::query_scalar("SELECT lidia_id FROM base_annotations WHERE zotero_annotation = ?")
            .bind(zotero_id)
            .fetch_all(&mut *conn)
            .await?;
    if !lidia_ids.is_empty() {
        sqlx::query("DELETE FROM base_annotations WHERE zotero_annotation = ?")
            .bind(zotero_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(lidia_ids)
}

async fn existing_kind(
    conn: &mut SqliteConnection,
    lidia_id: &str,
) -> Result<Option<String>, IngestError> {
    Ok(
        sqlx::query_scalar("SELECT kind FROM base_annotations WHERE lidia_id = ?")
            .bind(lidia_id)
            .fetch_optional(&mut *conn)
            .await?,
    )
}

/// Fail when `lidia_id` is already taken by the other variant.
async fn ensure_kind(
    conn: &mut SqliteConnection,
    lidia_id: &str,
    expected: AnnotationKind,
) -> Result<(), IngestError> {
    match existing_kind(conn, lidia_id).await? {
        Some(kind) if kind != expected.as_str() => Err(IngestError::KindConflict {
            lidia_id: lidia_id.to_string(),
            existing: kind,
        }),
        _ => Ok(()),
    }
}

async fn publication_exists(
    conn: &mut SqliteConnection,
    attachment_id: &str,
) -> Result<bool, IngestError> {
    let row = sqlx::query("SELECT 1 AS present FROM publications WHERE attachment_id = ?")
        .bind(attachment_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| r.get::<i64, _>("present") == 1).unwrap_or(false))
}
