use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Tables holding items exactly as fetched from the remote library.
const RAW_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS raw_publications (
        zotero_id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS raw_annotations (
        zotero_id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_state (
        library_id TEXT PRIMARY KEY,
        library_version INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
];

/// Normalized tables, in foreign-key dependency order.
const NORMALIZED_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS publications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        zotero_id TEXT NOT NULL UNIQUE,
        attachment_id TEXT UNIQUE,
        title TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS languages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        name TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS base_annotations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        lidia_id TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL CHECK (kind IN ('annotation', 'continuation')),
        zotero_annotation TEXT UNIQUE
            REFERENCES raw_annotations(zotero_id) ON DELETE SET NULL,
        parent_attachment TEXT
            REFERENCES publications(attachment_id) ON DELETE CASCADE ON UPDATE CASCADE,
        textselection TEXT NOT NULL DEFAULT '',
        sort_index TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS annotations (
        base_id INTEGER PRIMARY KEY
            REFERENCES base_annotations(id) ON DELETE CASCADE,
        argname TEXT NOT NULL DEFAULT '',
        arglang_id INTEGER REFERENCES languages(id) ON DELETE SET NULL,
        description TEXT NOT NULL DEFAULT '',
        page_start TEXT,
        page_end TEXT,
        relation_type TEXT NOT NULL DEFAULT '',
        relation_to_id INTEGER REFERENCES annotations(base_id) ON DELETE SET NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS continuation_annotations (
        base_id INTEGER PRIMARY KEY
            REFERENCES base_annotations(id) ON DELETE CASCADE,
        start_annotation_id INTEGER
            REFERENCES annotations(base_id) ON DELETE SET NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_terms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        term TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lidia_terms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        vocab TEXT NOT NULL CHECK (vocab IN ('lol', 'custom')),
        term TEXT NOT NULL,
        UNIQUE(vocab, term)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS term_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        annotation_id INTEGER NOT NULL
            REFERENCES annotations(base_id) ON DELETE CASCADE,
        idx INTEGER NOT NULL,
        termtype TEXT NOT NULL DEFAULT '',
        articleterm_id INTEGER REFERENCES article_terms(id) ON DELETE SET NULL,
        category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
        lidiaterm_id INTEGER REFERENCES lidia_terms(id) ON DELETE SET NULL,
        UNIQUE(annotation_id, idx)
    )
    "#,
];

/// Normalized tables in the order they can be emptied without tripping
/// foreign keys. Used by reset.
pub const NORMALIZED_DELETE_ORDER: &[&str] = &[
    "term_groups",
    "continuation_annotations",
    "annotations",
    "base_annotations",
    "lidia_terms",
    "categories",
    "article_terms",
    "languages",
    "publications",
];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for ddl in RAW_TABLES.iter().chain(NORMALIZED_TABLES) {
        sqlx::query(ddl).execute(pool).await?;
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_base_annotations_position ON base_annotations(parent_attachment, sort_index)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_continuations_start ON continuation_annotations(start_annotation_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_term_groups_annotation ON term_groups(annotation_id)")
        .execute(pool)
        .await?;

    Ok(())
}
