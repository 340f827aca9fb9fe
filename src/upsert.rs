//! The one create-or-update operation every entity goes through.
//!
//! An [`Upsert`] names a table, the natural-key columns that identify a row
//! and the data columns to write. It can run in two modes:
//!
//! | Method | Existing row | Missing row |
//! |--------|--------------|-------------|
//! | [`Upsert::create_or_update`] | overwrite every field (last write wins) | insert |
//! | [`Upsert::get_or_create`] | leave untouched | insert |
//!
//! Both return the row id and whether the row was created. Table and column
//! names come from this crate only, never from input data.

use sqlx::{Row, SqliteConnection};

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(Option<String>),
    Int(Option<i64>),
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Text(Some(s.to_string()))
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Field::Text(Some(s))
    }
}

impl From<Option<String>> for Field {
    fn from(s: Option<String>) -> Self {
        Field::Text(s)
    }
}

impl From<Option<&str>> for Field {
    fn from(s: Option<&str>) -> Self {
        Field::Text(s.map(str::to_string))
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Field::Int(Some(v))
    }
}

impl From<Option<i64>> for Field {
    fn from(v: Option<i64>) -> Self {
        Field::Int(v)
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_field<'q>(query: SqliteQuery<'q>, field: &Field) -> SqliteQuery<'q> {
    match field {
        Field::Text(v) => query.bind(v.clone()),
        Field::Int(v) => query.bind(*v),
    }
}

/// Result of an upsert: the row id and whether it was inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct Upsert {
    table: &'static str,
    id_column: &'static str,
    keys: Vec<(&'static str, Field)>,
    fields: Vec<(&'static str, Field)>,
}

impl Upsert {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            id_column: "id",
            keys: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Use a different primary-key column (e.g. `base_id`).
    pub fn id_column(mut self, column: &'static str) -> Self {
        self.id_column = column;
        self
    }

    /// Add a natural-key column.
    pub fn key(mut self, column: &'static str, value: impl Into<Field>) -> Self {
        self.keys.push((column, value.into()));
        self
    }

    /// Add a data column.
    pub fn field(mut self, column: &'static str, value: impl Into<Field>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    /// Insert the row, or overwrite every data column of the existing one.
    pub async fn create_or_update(&self, conn: &mut SqliteConnection) -> sqlx::Result<Upserted> {
        match self.find(conn).await? {
            Some(id) => {
                if !self.fields.is_empty() {
                    self.update(conn, id).await?;
                }
                Ok(Upserted { id, created: false })
            }
            None => self.insert(conn).await,
        }
    }

    /// Insert the row if missing; an existing row is returned unchanged.
    pub async fn get_or_create(&self, conn: &mut SqliteConnection) -> sqlx::Result<Upserted> {
        match self.find(conn).await? {
            Some(id) => Ok(Upserted { id, created: false }),
            None => self.insert(conn).await,
        }
    }

    async fn find(&self, conn: &mut SqliteConnection) -> sqlx::Result<Option<i64>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.id_column,
            self.table,
            self.key_predicate()
        );
        let mut query = sqlx::query(&sql);
        for (_, value) in &self.keys {
            query = bind_field(query, value);
        }
        let row = query.fetch_optional(&mut *conn).await?;
        row.map(|r| r.try_get::<i64, _>(0)).transpose()
    }

    async fn insert(&self, conn: &mut SqliteConnection) -> sqlx::Result<Upserted> {
        let columns: Vec<&str> = self
            .keys
            .iter()
            .chain(&self.fields)
            .map(|(c, _)| *c)
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            self.table,
            columns.join(", "),
            placeholders,
            self.id_column
        );
        let mut query = sqlx::query(&sql);
        for (_, value) in self.keys.iter().chain(&self.fields) {
            query = bind_field(query, value);
        }
        let row = query.fetch_one(&mut *conn).await?;
        Ok(Upserted {
            id: row.try_get(0)?,
            created: true,
        })
    }

    async fn update(&self, conn: &mut SqliteConnection, id: i64) -> sqlx::Result<()> {
        let assignments: Vec<String> = self
            .fields
            .iter()
            .map(|(c, _)| format!("{} = ?", c))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table,
            assignments.join(", "),
            self.id_column
        );
        let mut query = sqlx::query(&sql);
        for (_, value) in &self.fields {
            query = bind_field(query, value);
        }
        query.bind(id).execute(&mut *conn).await?;
        Ok(())
    }

    fn key_predicate(&self) -> String {
        self.keys
            .iter()
            .map(|(c, value)| match value {
                // `= NULL` never matches; natural keys are expected non-null
                Field::Text(None) | Field::Int(None) => format!("{} IS ?", c),
                _ => format!("{} = ?", c),
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}
