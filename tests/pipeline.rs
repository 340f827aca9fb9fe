//! End-to-end tests for the ingestion pipeline.
//!
//! Each test creates a fresh SQLite database in a temp dir, stores raw
//! Zotero items the way `lidia fetch` would, runs `populate` and inspects
//! the normalized tables through the library API.

use lidia_browser::config::Config;
use lidia_browser::db;
use lidia_browser::error::IngestWarning;
use lidia_browser::get::{get_annotation, list_annotations};
use lidia_browser::ingest::{populate, reset};
use lidia_browser::migrate;
use lidia_browser::raw::{self, RawKind};
use lidia_browser::stats::table_counts;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("data").join("lidia.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    (tmp, pool)
}

fn publication(key: &str, attachment_id: &str, title: &str) -> Value {
    json!({
        "key": key,
        "data": { "key": key, "itemType": "journalArticle", "title": title },
        "links": {
            "attachment": {
                "href": format!("https://api.zotero.org/groups/1/items/{}", attachment_id),
                "attachmentType": "application/pdf"
            }
        }
    })
}

fn annotation(key: &str, parent: &str, sort_index: &str, comment: &str) -> Value {
    json!({
        "key": key,
        "data": {
            "key": key,
            "itemType": "annotation",
            "parentItem": parent,
            "annotationType": "highlight",
            "annotationText": format!("text of {}", key),
            "annotationComment": comment,
            "annotationSortIndex": sort_index
        }
    })
}

async fn store(pool: &SqlitePool, kind: RawKind, items: &[Value]) {
    for item in items {
        raw::upsert_item(pool, kind, item).await.unwrap();
    }
}

async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}

async fn seed_basic(pool: &SqlitePool) {
    store(
        pool,
        RawKind::Publication,
        &[
            publication("PUB00001", "ATT00001", "Binding in Dutch"),
            publication("PUB00002", "ATT00002", "Anaphora revisited"),
        ],
    )
    .await;
    store(
        pool,
        RawKind::Annotation,
        &[
            annotation(
                "ANN00001",
                "ATT00001",
                "00024|000002|00069",
                "~~~~LIDIA~~~~\nlidiaId: L1\nargname: Principle A\narglang: nld\ndescription: local binding\npagestart: 24\npageend: 26\ntermgroups:\n  - termtype: definiendum\n    articleterm: anaphor\n    category: binding\n    lexiconterm: anaphor\n",
            ),
            annotation(
                "ANN00002",
                "ATT00001",
                "00026|000004|00099",
                "~~~~LIDIA~~~~\nargcont: true\n",
            ),
            annotation(
                "ANN00003",
                "ATT00002",
                "00003|000001|00010",
                "~~~~LIDIA~~~~\nlidiaId: L3\nargname: Logophors\nrelationType: generalizes\nrelationTo: L1\ntermgroups:\n  - termtype: definiens\n    articleterm: anaphor\n    lexiconterm: custom\n    customterm: logophor\n",
            ),
            annotation("ANN00004", "ATT00001", "00030|000001|00001", "plain highlight note"),
        ],
    )
    .await;
}

#[tokio::test]
async fn test_populate_builds_normalized_schema() {
    let (_tmp, pool) = setup().await;
    seed_basic(&pool).await;

    let report = populate(&pool).await.unwrap();

    assert_eq!(report.publications_created, 2);
    assert_eq!(report.annotations_created, 2);
    assert_eq!(report.continuations_created, 1);
    assert_eq!(report.continuations_linked, 1);
    assert_eq!(report.non_lidia, 1);
    assert_eq!(report.failed, 0);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let l1 = get_annotation(&pool, "L1").await.unwrap().unwrap();
    assert_eq!(l1.argname, "Principle A");
    assert_eq!(l1.language_code.as_deref(), Some("nld"));
    assert_eq!(l1.language_name.as_deref(), Some("Dutch"));
    assert_eq!(l1.publication_title.as_deref(), Some("Binding in Dutch"));
    assert_eq!(l1.page_start.as_deref(), Some("24"));
    assert_eq!(l1.zotero_annotation.as_deref(), Some("ANN00001"));
    assert_eq!(l1.continuations.len(), 1);
    assert_eq!(l1.continuations[0].lidia_id, "ANN00002");
    assert_eq!(l1.term_groups.len(), 1);
    assert_eq!(l1.term_groups[0].category.as_deref(), Some("binding"));
    assert_eq!(l1.term_groups[0].vocab.as_deref(), Some("lol"));

    let l3 = get_annotation(&pool, "L3").await.unwrap().unwrap();
    assert_eq!(l3.relation_to.as_deref(), Some("L1"));
    assert_eq!(l3.relation_display().as_deref(), Some("Generalizes L1"));
    assert_eq!(l3.language_code.as_deref(), Some("unspecified"));
    assert_eq!(l3.language_name, None);
    assert_eq!(l3.term_groups[0].lidiaterm.as_deref(), Some("logophor"));
    assert_eq!(l3.term_groups[0].vocab.as_deref(), Some("custom"));
}

#[tokio::test]
async fn test_populate_is_idempotent() {
    let (_tmp, pool) = setup().await;
    seed_basic(&pool).await;
    store(
        &pool,
        RawKind::Annotation,
        &[
            // orphan and unresolved placeholder are recreated and removed on every run
            annotation("ANN00009", "ATT00002", "00001|000001|00001", "~~~~LIDIA~~~~\nargcont: true\n"),
            annotation("ANN00010", "ATT00002", "00009|000001|00001", "~~~~LIDIA~~~~\nrelationTo: GHOST\nrelationType: supports\n"),
        ],
    )
    .await;

    populate(&pool).await.unwrap();
    let counts_once = table_counts(&pool).await.unwrap();
    let views_once = serde_json::to_value(list_annotations(&pool, None).await.unwrap()).unwrap();

    let second = populate(&pool).await.unwrap();
    let counts_twice = table_counts(&pool).await.unwrap();
    let views_twice = serde_json::to_value(list_annotations(&pool, None).await.unwrap()).unwrap();

    assert_eq!(counts_once, counts_twice);
    assert_eq!(views_once, views_twice);
    assert_eq!(second.annotations_created, 0);
    assert_eq!(second.annotations_updated, 3);
    assert_eq!(second.orphans_removed, 1);
    assert_eq!(second.placeholders_removed, 1);
}

#[tokio::test]
async fn test_page_range_spans_continuations() {
    let (_tmp, pool) = setup().await;
    seed_basic(&pool).await;
    populate(&pool).await.unwrap();

    let l1 = get_annotation(&pool, "L1").await.unwrap().unwrap();
    assert_eq!(l1.page_number_in_pdf, Some(25));
    assert_eq!(l1.page_range_in_pdf.as_deref(), Some("25\u{2013}27"));

    let l3 = get_annotation(&pool, "L3").await.unwrap().unwrap();
    assert_eq!(l3.page_range_in_pdf.as_deref(), Some("4"));
}

#[tokio::test]
async fn test_orphaned_continuation_is_removed() {
    let (_tmp, pool) = setup().await;
    store(
        &pool,
        RawKind::Publication,
        &[
            publication("PUB00001", "ATT00001", "First"),
            publication("PUB00002", "ATT00002", "Second"),
        ],
    )
    .await;
    store(
        &pool,
        RawKind::Annotation,
        &[
            annotation("ANN00001", "ATT00001", "00001|000001|00001", "~~~~LIDIA~~~~\nlidiaId: A1\n"),
            // first item in the second publication, so nothing precedes it there
            annotation("ANN00002", "ATT00002", "00000|000001|00001", "~~~~LIDIA~~~~\nlidiaId: C1\nargcont: true\n"),
        ],
    )
    .await;

    let report = populate(&pool).await.unwrap();

    assert_eq!(report.orphans_removed, 1);
    assert_eq!(report.continuations_linked, 0);
    assert!(report
        .warnings
        .contains(&IngestWarning::OrphanedContinuation {
            lidia_id: "C1".to_string()
        }));
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM base_annotations WHERE lidia_id = 'C1'").await,
        0
    );
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM continuation_annotations").await,
        0
    );
    let a1 = get_annotation(&pool, "A1").await.unwrap().unwrap();
    assert!(a1.continuations.is_empty());
}

#[tokio::test]
async fn test_forward_reference_placeholder_is_filled_in_place() {
    let (_tmp, pool) = setup().await;
    store(&pool, RawKind::Publication, &[publication("PUB00001", "ATT00001", "P")]).await;
    store(
        &pool,
        RawKind::Annotation,
        &[
            // processed first (key order), so B does not exist yet
            annotation("ANN0000A", "ATT00001", "00001|000001|00001", "~~~~LIDIA~~~~\nlidiaId: A\nrelationType: supports\nrelationTo: B\n"),
            annotation("ANN0000B", "ATT00001", "00002|000001|00001", "~~~~LIDIA~~~~\nlidiaId: B\nargname: Target\n"),
        ],
    )
    .await;

    let report = populate(&pool).await.unwrap();

    assert_eq!(report.placeholders_created, 1);
    assert_eq!(report.placeholders_removed, 0);
    // B was created as a placeholder, then updated by its real item
    assert_eq!(report.annotations_created, 1);
    assert_eq!(report.annotations_updated, 1);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM base_annotations WHERE lidia_id = 'B'").await,
        1
    );

    let b = get_annotation(&pool, "B").await.unwrap().unwrap();
    assert_eq!(b.argname, "Target");
    assert_eq!(b.zotero_annotation.as_deref(), Some("ANN0000B"));

    let a = get_annotation(&pool, "A").await.unwrap().unwrap();
    assert_eq!(a.relation_to.as_deref(), Some("B"));
}

#[tokio::test]
async fn test_unresolved_placeholder_is_removed_and_relation_cleared() {
    let (_tmp, pool) = setup().await;
    store(&pool, RawKind::Publication, &[publication("PUB00001", "ATT00001", "P")]).await;
    store(
        &pool,
        RawKind::Annotation,
        &[annotation(
            "ANN0000A",
            "ATT00001",
            "00001|000001|00001",
            "~~~~LIDIA~~~~\nlidiaId: A\nrelationType: contradicts\nrelationTo: NEVER\n",
        )],
    )
    .await;

    let report = populate(&pool).await.unwrap();

    assert_eq!(report.placeholders_created, 1);
    assert_eq!(report.placeholders_removed, 1);
    assert!(report
        .warnings
        .contains(&IngestWarning::UnresolvedPlaceholders { count: 1 }));
    assert!(get_annotation(&pool, "NEVER").await.unwrap().is_none());

    let a = get_annotation(&pool, "A").await.unwrap().unwrap();
    assert_eq!(a.relation_to, None);
    assert_eq!(a.relation_type, "contradicts");
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM base_annotations WHERE zotero_annotation IS NULL").await,
        0
    );
}

#[tokio::test]
async fn test_non_lidia_items_produce_no_rows() {
    let (_tmp, pool) = setup().await;
    store(&pool, RawKind::Publication, &[publication("PUB00001", "ATT00001", "P")]).await;
    store(
        &pool,
        RawKind::Annotation,
        &[
            annotation("ANN00001", "ATT00001", "00001|000001|00001", "interesting!"),
            annotation("ANN00002", "ATT00001", "00002|000001|00001", ""),
        ],
    )
    .await;

    let report = populate(&pool).await.unwrap();

    assert_eq!(report.non_lidia, 2);
    assert!(report.warnings.is_empty());
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM base_annotations").await, 0);
}

#[tokio::test]
async fn test_shared_vocabulary_is_deduplicated() {
    let (_tmp, pool) = setup().await;
    seed_basic(&pool).await;
    populate(&pool).await.unwrap();

    // "anaphor" is used by both L1 and L3
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM article_terms").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM term_groups").await, 2);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM lidia_terms WHERE term = 'anaphor' AND vocab = 'lol'").await,
        1
    );
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM languages").await, 2);
}

#[tokio::test]
async fn test_malformed_payload_is_skipped_without_stopping_run() {
    let (_tmp, pool) = setup().await;
    store(&pool, RawKind::Publication, &[publication("PUB00001", "ATT00001", "P")]).await;
    store(
        &pool,
        RawKind::Annotation,
        &[
            annotation("ANN00001", "ATT00001", "00001|000001|00001", "~~~~LIDIA~~~~\nargname: [broken"),
            annotation("ANN00002", "ATT00001", "00002|000001|00001", "~~~~LIDIA~~~~\nrelationType: refutes\n"),
            annotation("ANN00003", "ATT00001", "00003|000001|00001", "~~~~LIDIA~~~~\nargname: Fine\n"),
        ],
    )
    .await;

    let report = populate(&pool).await.unwrap();

    assert_eq!(report.skipped, 2);
    assert_eq!(report.annotations_created, 1);
    assert!(matches!(
        report.warnings[0],
        IngestWarning::SkippedItem { ref zotero_id, .. } if zotero_id == "ANN00001"
    ));
    assert!(get_annotation(&pool, "ANN00003").await.unwrap().is_some());
}

#[tokio::test]
async fn test_term_groups_follow_latest_payload() {
    let (_tmp, pool) = setup().await;
    store(&pool, RawKind::Publication, &[publication("PUB00001", "ATT00001", "P")]).await;
    store(
        &pool,
        RawKind::Annotation,
        &[annotation(
            "ANN00001",
            "ATT00001",
            "00001|000001|00001",
            "~~~~LIDIA~~~~\nlidiaId: T\ntermgroups:\n  - termtype: definiendum\n    articleterm: one\n  - termtype: definiens\n    articleterm: two\n",
        )],
    )
    .await;
    populate(&pool).await.unwrap();
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM term_groups").await, 2);

    store(
        &pool,
        RawKind::Annotation,
        &[annotation(
            "ANN00001",
            "ATT00001",
            "00001|000001|00001",
            "~~~~LIDIA~~~~\nlidiaId: T\ntermgroups:\n  - termtype: other\n    articleterm: three\n",
        )],
    )
    .await;
    populate(&pool).await.unwrap();

    let t = get_annotation(&pool, "T").await.unwrap().unwrap();
    assert_eq!(t.term_groups.len(), 1);
    assert_eq!(t.term_groups[0].index, 0);
    assert_eq!(t.term_groups[0].termtype, "other");
    assert_eq!(t.term_groups[0].articleterm.as_deref(), Some("three"));
}

#[tokio::test]
async fn test_lidia_id_kind_conflict_fails_only_that_item() {
    let (_tmp, pool) = setup().await;
    store(&pool, RawKind::Publication, &[publication("PUB00001", "ATT00001", "P")]).await;
    store(
        &pool,
        RawKind::Annotation,
        &[
            annotation("ANN00001", "ATT00001", "00001|000001|00001", "~~~~LIDIA~~~~\nlidiaId: K\n"),
            annotation("ANN00002", "ATT00001", "00002|000001|00001", "~~~~LIDIA~~~~\nlidiaId: K\nargcont: true\n"),
            annotation("ANN00003", "ATT00001", "00003|000001|00001", "~~~~LIDIA~~~~\nlidiaId: OK\n"),
        ],
    )
    .await;

    let report = populate(&pool).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.annotations_created, 2);
    assert!(matches!(
        report.warnings[0],
        IngestWarning::FailedItem { ref zotero_id, .. } if zotero_id == "ANN00002"
    ));
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM continuation_annotations").await, 0);
}

#[tokio::test]
async fn test_unknown_publication_is_reported() {
    let (_tmp, pool) = setup().await;
    store(
        &pool,
        RawKind::Annotation,
        &[annotation("ANN00001", "NOSUCH01", "00001|000001|00001", "~~~~LIDIA~~~~\nlidiaId: U\n")],
    )
    .await;

    let report = populate(&pool).await.unwrap();

    assert_eq!(report.annotations_created, 1);
    assert!(report.warnings.contains(&IngestWarning::UnknownPublication {
        lidia_id: "U".to_string(),
        attachment_id: "NOSUCH01".to_string(),
    }));
    let u = get_annotation(&pool, "U").await.unwrap().unwrap();
    assert_eq!(u.attachment_id, None);
}

#[tokio::test]
async fn test_reset_clears_normalized_data_only() {
    let (_tmp, pool) = setup().await;
    seed_basic(&pool).await;
    populate(&pool).await.unwrap();

    reset(&pool).await.unwrap();

    for (table, rows) in table_counts(&pool).await.unwrap() {
        assert_eq!(rows, 0, "{} not empty after reset", table);
    }
    assert_eq!(raw::count_items(&pool, RawKind::Annotation).await.unwrap(), 4);

    let report = populate(&pool).await.unwrap();
    assert_eq!(report.annotations_created, 2);
}

#[tokio::test]
async fn test_changed_lidia_id_replaces_previous_row() {
    let (_tmp, pool) = setup().await;
    store(&pool, RawKind::Publication, &[publication("PUB00001", "ATT00001", "P")]).await;
    store(
        &pool,
        RawKind::Annotation,
        &[
            annotation("ANN00001", "ATT00001", "00001|000001|00001", "~~~~LIDIA~~~~\nargname: Old\n"),
            annotation("ANN00002", "ATT00001", "00002|000001|00001", "~~~~LIDIA~~~~\nargcont: true\n"),
        ],
    )
    .await;
    populate(&pool).await.unwrap();
    assert!(get_annotation(&pool, "ANN00001").await.unwrap().is_some());

    // the curator assigns an explicit id to an imported annotation
    store(
        &pool,
        RawKind::Annotation,
        &[annotation(
            "ANN00001",
            "ATT00001",
            "00001|000001|00001",
            "~~~~LIDIA~~~~\nlidiaId: L9\nargname: New\n",
        )],
    )
    .await;
    let report = populate(&pool).await.unwrap();

    assert_eq!(report.failed, 0, "{:?}", report.warnings);
    assert!(get_annotation(&pool, "ANN00001").await.unwrap().is_none());
    let l9 = get_annotation(&pool, "L9").await.unwrap().unwrap();
    assert_eq!(l9.argname, "New");
    assert_eq!(l9.zotero_annotation.as_deref(), Some("ANN00001"));
    assert_eq!(l9.continuations.len(), 1);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM base_annotations WHERE zotero_annotation = 'ANN00001'").await,
        1
    );

    let again = populate(&pool).await.unwrap();
    assert_eq!(again.failed, 0);
    assert_eq!(again.annotations_created, 0);
    assert_eq!(again.annotations_updated, 1);
}

#[tokio::test]
async fn test_item_no_longer_lidia_is_removed() {
    let (_tmp, pool) = setup().await;
    store(&pool, RawKind::Publication, &[publication("PUB00001", "ATT00001", "P")]).await;
    store(
        &pool,
        RawKind::Annotation,
        &[
            annotation("ANN00001", "ATT00001", "00001|000001|00001", "~~~~LIDIA~~~~\nlidiaId: A\n"),
            annotation("ANN00002", "ATT00001", "00002|000001|00001", "~~~~LIDIA~~~~\nargcont: true\n"),
            annotation("ANN00003", "ATT00001", "00003|000001|00001", "~~~~LIDIA~~~~\nlidiaId: R\nrelationType: supports\nrelationTo: A\n"),
        ],
    )
    .await;
    populate(&pool).await.unwrap();
    assert_eq!(
        get_annotation(&pool, "R").await.unwrap().unwrap().relation_to.as_deref(),
        Some("A")
    );

    // the LIDIA marker is removed from the comment in Zotero
    store(
        &pool,
        RawKind::Annotation,
        &[annotation("ANN00001", "ATT00001", "00001|000001|00001", "just a note")],
    )
    .await;
    let report = populate(&pool).await.unwrap();

    assert_eq!(report.non_lidia, 1);
    assert_eq!(report.annotations_retired, 1);
    assert!(get_annotation(&pool, "A").await.unwrap().is_none());
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM base_annotations WHERE zotero_annotation = 'ANN00001'").await,
        0
    );
    // its continuation lost its owner and the relation to it was cleared
    assert_eq!(report.orphans_removed, 1);
    assert_eq!(report.placeholders_removed, 1);
    let r = get_annotation(&pool, "R").await.unwrap().unwrap();
    assert_eq!(r.relation_to, None);
}

#[tokio::test]
async fn test_relation_to_continuation_is_dropped() {
    let (_tmp, pool) = setup().await;
    store(&pool, RawKind::Publication, &[publication("PUB00001", "ATT00001", "P")]).await;
    store(
        &pool,
        RawKind::Annotation,
        &[
            annotation("ANN00001", "ATT00001", "00001|000001|00001", "~~~~LIDIA~~~~\nlidiaId: A\n"),
            annotation("ANN00002", "ATT00001", "00002|000001|00001", "~~~~LIDIA~~~~\nlidiaId: C\nargcont: true\n"),
            annotation("ANN00003", "ATT00001", "00003|000001|00001", "~~~~LIDIA~~~~\nlidiaId: R\nargname: Kept\nrelationType: supports\nrelationTo: C\n"),
        ],
    )
    .await;

    let report = populate(&pool).await.unwrap();

    assert_eq!(report.failed, 0);
    assert!(report.warnings.contains(&IngestWarning::RelationToContinuation {
        lidia_id: "R".to_string(),
        target: "C".to_string(),
    }));
    let r = get_annotation(&pool, "R").await.unwrap().unwrap();
    assert_eq!(r.argname, "Kept");
    assert_eq!(r.relation_to, None);
    let a = get_annotation(&pool, "A").await.unwrap().unwrap();
    assert_eq!(a.continuations[0].lidia_id, "C");
}

#[tokio::test]
async fn test_annotation_turned_into_continuation() {
    let (_tmp, pool) = setup().await;
    store(&pool, RawKind::Publication, &[publication("PUB00001", "ATT00001", "P")]).await;
    store(
        &pool,
        RawKind::Annotation,
        &[
            annotation("ANN00001", "ATT00001", "00001|000001|00001", "~~~~LIDIA~~~~\nlidiaId: A\n"),
            annotation("ANN00002", "ATT00001", "00002|000001|00001", "~~~~LIDIA~~~~\nlidiaId: B\n"),
        ],
    )
    .await;
    populate(&pool).await.unwrap();

    store(
        &pool,
        RawKind::Annotation,
        &[annotation("ANN00002", "ATT00001", "00002|000001|00001", "~~~~LIDIA~~~~\nlidiaId: B\nargcont: true\n")],
    )
    .await;
    let report = populate(&pool).await.unwrap();

    assert_eq!(report.failed, 0);
    assert_eq!(report.continuations_created, 1);
    assert!(get_annotation(&pool, "B").await.unwrap().is_none());
    let a = get_annotation(&pool, "A").await.unwrap().unwrap();
    assert_eq!(a.continuations.len(), 1);
    assert_eq!(a.continuations[0].lidia_id, "B");
}
