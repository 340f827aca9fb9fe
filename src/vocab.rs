//! Get-or-create for shared reference vocabularies.
//!
//! Languages, article terms, categories and lexicon terms are created on
//! first use and looked up by natural key afterwards. None of them is ever
//! overwritten by ingestion.

use sqlx::SqliteConnection;

use crate::languages::language_name;
use crate::models::Vocab;
use crate::upsert::Upsert;

/// Language id for `code`. The name is filled from the code table when the
/// row is first created.
pub async fn resolve_language(conn: &mut SqliteConnection, code: &str) -> sqlx::Result<i64> {
    let upserted = Upsert::new("languages")
        .key("code", code)
        .field("name", language_name(code))
        .get_or_create(conn)
        .await?;
    if upserted.created {
        tracing::debug!(code, "created language");
    }
    Ok(upserted.id)
}

pub async fn resolve_article_term(conn: &mut SqliteConnection, term: &str) -> sqlx::Result<i64> {
    Ok(Upsert::new("article_terms")
        .key("term", term)
        .get_or_create(conn)
        .await?
        .id)
}

pub async fn resolve_category(conn: &mut SqliteConnection, category: &str) -> sqlx::Result<i64> {
    Ok(Upsert::new("categories")
        .key("category", category)
        .get_or_create(conn)
        .await?
        .id)
}

pub async fn resolve_lidia_term(
    conn: &mut SqliteConnection,
    vocab: Vocab,
    term: &str,
) -> sqlx::Result<i64> {
    Ok(Upsert::new("lidia_terms")
        .key("vocab", vocab.as_str())
        .key("term", term)
        .get_or_create(conn)
        .await?
        .id)
}
