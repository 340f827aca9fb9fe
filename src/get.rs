//! Read side: annotations with their term groups, continuations and the
//! page range derived from sort indices.
//!
//! Used by `lidia show` and `lidia list`.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::models::{format_page_range, RelationType, SortIndex};

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationView {
    pub lidia_id: String,
    pub zotero_annotation: Option<String>,
    pub attachment_id: Option<String>,
    pub publication_title: Option<String>,
    pub argname: String,
    pub language_code: Option<String>,
    pub language_name: Option<String>,
    pub description: String,
    pub page_start: Option<String>,
    pub page_end: Option<String>,
    pub relation_type: String,
    pub relation_to: Option<String>,
    pub textselection: String,
    pub sort_index: String,
    pub page_number_in_pdf: Option<i64>,
    pub page_range_in_pdf: Option<String>,
    pub term_groups: Vec<TermGroupView>,
    pub continuations: Vec<ContinuationView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TermGroupView {
    pub index: i64,
    pub termtype: String,
    pub articleterm: Option<String>,
    pub category: Option<String>,
    pub vocab: Option<String>,
    pub lidiaterm: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContinuationView {
    pub lidia_id: String,
    pub textselection: String,
    pub sort_index: String,
    pub page_number_in_pdf: Option<i64>,
}

impl AnnotationView {
    /// `"Supports L2"`, or `None` when there is no relation.
    pub fn relation_display(&self) -> Option<String> {
        let relation: RelationType = self.relation_type.parse().ok()?;
        if relation == RelationType::None {
            return None;
        }
        Some(format!(
            "{} {}",
            relation.label(),
            self.relation_to.as_deref().unwrap_or("(removed)")
        ))
    }

    /// Comma-separated lexicon (or article) terms of all term groups.
    pub fn term_summary(&self) -> String {
        self.term_groups
            .iter()
            .filter_map(|tg| tg.lidiaterm.as_deref().or(tg.articleterm.as_deref()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Page range of an annotation: from its own page to the page of its last
/// continuation. `None` when the annotation's own page is unknown.
pub fn page_range_in_pdf(sort_index: &SortIndex, continuations: &[SortIndex]) -> Option<String> {
    let start = sort_index.page_number()?;
    let end = continuations
        .iter()
        .max()
        .and_then(SortIndex::page_number)
        .unwrap_or(start);
    Some(format_page_range(start, end))
}

const ANNOTATION_SELECT: &str = r#"
    SELECT b.id, b.lidia_id, b.zotero_annotation, b.parent_attachment, b.textselection,
           b.sort_index, a.argname, a.description, a.page_start, a.page_end,
           a.relation_type, l.code AS language_code, l.name AS language_name,
           p.title AS publication_title, r.lidia_id AS relation_to
    FROM base_annotations b
    JOIN annotations a ON a.base_id = b.id
    LEFT JOIN languages l ON l.id = a.arglang_id
    LEFT JOIN publications p ON p.attachment_id = b.parent_attachment
    LEFT JOIN base_annotations r ON r.id = a.relation_to_id
"#;

/// Fetch one annotation by lidia id.
pub async fn get_annotation(pool: &SqlitePool, lidia_id: &str) -> Result<Option<AnnotationView>> {
    let row = sqlx::query(&format!("{} WHERE b.lidia_id = ?", ANNOTATION_SELECT))
        .bind(lidia_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(build_view(pool, &row).await?)),
        None => Ok(None),
    }
}

/// All annotations in document order, optionally for one attachment only.
pub async fn list_annotations(
    pool: &SqlitePool,
    attachment_id: Option<&str>,
) -> Result<Vec<AnnotationView>> {
    let rows = match attachment_id {
        Some(att) => {
            sqlx::query(&format!(
                "{} WHERE b.parent_attachment = ? ORDER BY b.parent_attachment, b.sort_index",
                ANNOTATION_SELECT
            ))
            .bind(att)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "{} ORDER BY b.parent_attachment, b.sort_index",
                ANNOTATION_SELECT
            ))
            .fetch_all(pool)
            .await?
        }
    };

    let mut views = Vec::with_capacity(rows.len());
    for row in &rows {
        views.push(build_view(pool, row).await?);
    }
    Ok(views)
}

async fn build_view(pool: &SqlitePool, row: &SqliteRow) -> Result<AnnotationView> {
    let base_id: i64 = row.get("id");

    let term_groups: Vec<TermGroupView> = sqlx::query(
        r#"
        SELECT tg.idx, tg.termtype, at.term AS articleterm, c.category,
               lt.vocab, lt.term AS lidiaterm
        FROM term_groups tg
        LEFT JOIN article_terms at ON at.id = tg.articleterm_id
        LEFT JOIN categories c ON c.id = tg.category_id
        LEFT JOIN lidia_terms lt ON lt.id = tg.lidiaterm_id
        WHERE tg.annotation_id = ?
        ORDER BY tg.idx ASC
        "#,
    )
    .bind(base_id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|r| TermGroupView {
        index: r.get("idx"),
        termtype: r.get("termtype"),
        articleterm: r.get("articleterm"),
        category: r.get("category"),
        vocab: r.get("vocab"),
        lidiaterm: r.get("lidiaterm"),
    })
    .collect();

    let continuations: Vec<ContinuationView> = sqlx::query(
        r#"
        SELECT b.lidia_id, b.textselection, b.sort_index
        FROM continuation_annotations c
        JOIN base_annotations b ON b.id = c.base_id
        WHERE c.start_annotation_id = ?
        ORDER BY b.sort_index ASC
        "#,
    )
    .bind(base_id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|r| {
        let sort_index: String = r.get("sort_index");
        ContinuationView {
            lidia_id: r.get("lidia_id"),
            textselection: r.get("textselection"),
            page_number_in_pdf: SortIndex::new(sort_index.as_str()).page_number(),
            sort_index,
        }
    })
    .collect();

    let sort_index = SortIndex::new(row.get::<String, _>("sort_index"));
    let continuation_indices: Vec<SortIndex> = continuations
        .iter()
        .map(|c| SortIndex::new(c.sort_index.as_str()))
        .collect();

    Ok(AnnotationView {
        lidia_id: row.get("lidia_id"),
        zotero_annotation: row.get("zotero_annotation"),
        attachment_id: row.get("parent_attachment"),
        publication_title: row.get("publication_title"),
        argname: row.get("argname"),
        language_code: row.get("language_code"),
        language_name: row.get("language_name"),
        description: row.get("description"),
        page_start: row.get("page_start"),
        page_end: row.get("page_end"),
        relation_type: row.get("relation_type"),
        relation_to: row.get("relation_to"),
        textselection: row.get("textselection"),
        page_number_in_pdf: sort_index.page_number(),
        page_range_in_pdf: page_range_in_pdf(&sort_index, &continuation_indices),
        sort_index: sort_index.0,
        term_groups,
        continuations,
    })
}

/// CLI entry point for `lidia show`.
pub async fn run_show(config: &Config, lidia_id: &str, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let view = get_annotation(&pool, lidia_id).await?;
    pool.close().await;

    let view = match view {
        Some(v) => v,
        None => bail!("annotation not found: {}", lidia_id),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("--- Annotation ---");
    println!("lidia_id:     {}", view.lidia_id);
    println!(
        "name:         {}",
        if view.argname.is_empty() {
            "(no name)"
        } else {
            view.argname.as_str()
        }
    );
    println!(
        "publication:  {}",
        view.publication_title.as_deref().unwrap_or("(undefined)")
    );
    println!(
        "language:     {}",
        view.language_name
            .as_deref()
            .or(view.language_code.as_deref())
            .unwrap_or("(none)")
    );
    println!(
        "pages (pdf):  {}",
        view.page_range_in_pdf.as_deref().unwrap_or("unknown")
    );
    if view.page_start.is_some() || view.page_end.is_some() {
        println!(
            "pages (doc):  {}-{}",
            view.page_start.as_deref().unwrap_or("?"),
            view.page_end.as_deref().unwrap_or("?")
        );
    }
    if let Some(relation) = view.relation_display() {
        println!("relation:     {}", relation);
    }
    if let Some(ref z) = view.zotero_annotation {
        println!("zotero:       {}", z);
    }
    println!();

    if !view.description.is_empty() {
        println!("--- Description ---");
        println!("{}", view.description);
        println!();
    }

    println!("--- Text ---");
    println!("{}", view.textselection);
    for c in &view.continuations {
        println!("[continued, {}]", c.lidia_id);
        println!("{}", c.textselection);
    }
    println!();

    println!("--- Term groups ({}) ---", view.term_groups.len());
    for tg in &view.term_groups {
        println!(
            "[{}] {:<12} article: {:<20} category: {:<16} term: {}{}",
            tg.index,
            if tg.termtype.is_empty() {
                "(undefined)"
            } else {
                tg.termtype.as_str()
            },
            tg.articleterm.as_deref().unwrap_or("-"),
            tg.category.as_deref().unwrap_or("-"),
            tg.lidiaterm.as_deref().unwrap_or("-"),
            tg.vocab
                .as_deref()
                .map(|v| format!(" ({})", v))
                .unwrap_or_default()
        );
    }

    Ok(())
}

/// CLI entry point for `lidia list`.
pub async fn run_list(config: &Config, attachment_id: Option<&str>) -> Result<()> {
    let pool = db::connect(config).await?;
    let views = list_annotations(&pool, attachment_id).await?;
    pool.close().await;

    println!(
        "{:<12} {:<32} {:<14} {:<8} TERMS",
        "LIDIA ID", "NAME", "LANGUAGE", "PAGES"
    );
    println!("{}", "-".repeat(88));
    for v in &views {
        println!(
            "{:<12} {:<32} {:<14} {:<8} {}",
            v.lidia_id,
            truncate(if v.argname.is_empty() { "(no name)" } else { v.argname.as_str() }, 32),
            v.language_code.as_deref().unwrap_or("-"),
            v.page_range_in_pdf.as_deref().unwrap_or("?"),
            v.term_summary()
        );
    }
    println!();
    println!("{} annotation(s)", views.len());

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}\u{2026}", cut)
    }
}
