//! Safe upsert against a uniqueness constraint
//!
//! Inserts a record when no row matches its conflict-key columns, otherwise
//! updates only the permitted columns of the existing row. The whole operation
//! runs in one write transaction:
//!
//! 1. `INSERT ... ON CONFLICT(keys) DO NOTHING`
//! 2. when nothing was inserted, `UPDATE ... SET <update fields> WHERE <keys>`
//! 3. `SELECT *` by keys
//!
//! SQLite serializes writers, so two concurrent upserts for the same key
//! converge on a single row and each caller learns whether it inserted or
//! updated. Nothing is checked application-side before the write.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::query::{Query, QueryAs};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, FromRow, Row, Sqlite, SqlitePool, ValueRef};

use crate::db::models::CourseRating;
use crate::retry::{self, RetryPolicy};
use crate::{Error, Result};

/// Maximum identifier length accepted in generated SQL
const MAX_IDENTIFIER_LEN: usize = 64;

/// A column value in an upsert record
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl SqlValue {
    fn bind<'q>(
        &self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Timestamp(v) => query.bind(*v),
        }
    }

    fn bind_as<'q, R>(
        &self,
        query: QueryAs<'q, Sqlite, R, SqliteArguments<'q>>,
    ) -> QueryAs<'q, Sqlite, R, SqliteArguments<'q>> {
        match self {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Timestamp(v) => query.bind(*v),
        }
    }
}

/// Insert-or-update request
#[derive(Debug, Clone)]
pub struct UpsertRequest<'a> {
    /// Target table
    pub table: &'a str,
    /// Full candidate record, in column order
    pub record: Vec<(&'a str, SqlValue)>,
    /// Columns forming the uniqueness constraint
    pub conflict_keys: &'a [&'a str],
    /// Columns overwritten when the row already exists
    pub update_fields: &'a [&'a str],
}

/// Stored row after the upsert, and whether it was newly created
#[derive(Debug, Clone)]
pub struct UpsertOutcome<R> {
    pub row: R,
    pub inserted: bool,
}

/// Row decoded column-by-column into JSON, for tables without a model
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRow(pub Map<String, Value>);

impl<'r> FromRow<'r, SqliteRow> for JsonRow {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let mut map = Map::new();

        for column in row.columns() {
            let i = column.ordinal();
            let value = if row.try_get_raw(i)?.is_null() {
                Value::Null
            } else {
                row.try_get::<i64, _>(i)
                    .map(Value::from)
                    .or_else(|_| row.try_get::<f64, _>(i).map(Value::from))
                    .or_else(|_| row.try_get::<String, _>(i).map(Value::String))
                    .unwrap_or(Value::Null)
            };
            map.insert(column.name().to_string(), value);
        }

        Ok(JsonRow(map))
    }
}

/// Only ASCII alphanumerics and underscore reach generated SQL
fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() < MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

impl<'a> UpsertRequest<'a> {
    fn value_of(&self, column: &str) -> Option<&SqlValue> {
        self.record
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// Reject anything that would produce malformed or unsafe SQL
    fn validate(&self) -> Result<()> {
        if !is_valid_identifier(self.table) {
            return Err(Error::InvalidInput(format!("Invalid table name: {}", self.table)));
        }
        if self.record.is_empty() {
            return Err(Error::InvalidInput("Upsert record is empty".to_string()));
        }
        if self.conflict_keys.is_empty() {
            return Err(Error::InvalidInput("Upsert requires at least one conflict key".to_string()));
        }

        for (i, (column, _)) in self.record.iter().enumerate() {
            if !is_valid_identifier(column) {
                return Err(Error::InvalidInput(format!("Invalid column name: {}", column)));
            }
            if self.record[..i].iter().any(|(other, _)| other == column) {
                return Err(Error::InvalidInput(format!("Duplicate column: {}", column)));
            }
        }

        for key in self.conflict_keys {
            match self.value_of(key) {
                None => {
                    return Err(Error::InvalidInput(format!(
                        "Conflict key {} missing from record",
                        key
                    )))
                }
                // NULLs never collide in a UNIQUE index
                Some(SqlValue::Null) => {
                    return Err(Error::InvalidInput(format!("Conflict key {} is NULL", key)))
                }
                Some(_) => {}
            }
        }

        for field in self.update_fields {
            if self.value_of(field).is_none() {
                return Err(Error::InvalidInput(format!(
                    "Update field {} missing from record",
                    field
                )));
            }
            if self.conflict_keys.contains(field) {
                return Err(Error::InvalidInput(format!(
                    "Field {} cannot be both a conflict key and updatable",
                    field
                )));
            }
        }

        Ok(())
    }

    fn key_filter(&self) -> String {
        self.conflict_keys
            .iter()
            .map(|key| format!("{} = ?", key))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn insert_sql(&self) -> String {
        let columns: Vec<&str> = self.record.iter().map(|(name, _)| *name).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO NOTHING",
            self.table,
            columns.join(", "),
            placeholders,
            self.conflict_keys.join(", ")
        )
    }

    fn update_sql(&self) -> String {
        let assignments = self
            .update_fields
            .iter()
            .map(|field| format!("{} = ?", field))
            .collect::<Vec<_>>()
            .join(", ");
        format!("UPDATE {} SET {} WHERE {}", self.table, assignments, self.key_filter())
    }

    fn select_sql(&self) -> String {
        format!("SELECT * FROM {} WHERE {}", self.table, self.key_filter())
    }

    fn key_values(&self) -> impl Iterator<Item = &SqlValue> + '_ {
        self.conflict_keys
            .iter()
            .filter_map(move |key| self.value_of(key))
    }
}

/// Insert the record, or update the permitted fields of the existing row.
///
/// Fails with `InvalidInput` before any I/O when the request is malformed,
/// and with `Database` when the storage layer rejects the write.
pub async fn safe_upsert<R>(pool: &SqlitePool, request: &UpsertRequest<'_>) -> Result<UpsertOutcome<R>>
where
    R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    request.validate()?;

    let insert_sql = request.insert_sql();
    let update_sql = request.update_sql();
    let select_sql = request.select_sql();

    let mut tx = pool.begin().await?;

    let mut insert = sqlx::query(&insert_sql);
    for (_, value) in &request.record {
        insert = value.bind(insert);
    }
    let inserted = insert.execute(&mut *tx).await?.rows_affected() == 1;

    if !inserted && !request.update_fields.is_empty() {
        let mut update = sqlx::query(&update_sql);
        for field in request.update_fields {
            if let Some(value) = request.value_of(field) {
                update = value.bind(update);
            }
        }
        for value in request.key_values() {
            update = value.bind(update);
        }
        update.execute(&mut *tx).await?;
    }

    let mut select = sqlx::query_as::<_, R>(&select_sql);
    for value in request.key_values() {
        select = value.bind_as(select);
    }
    let row = select.fetch_one(&mut *tx).await?;

    tx.commit().await?;

    tracing::debug!(
        table = request.table,
        inserted,
        "Upsert applied"
    );

    Ok(UpsertOutcome { row, inserted })
}

/// Learner's rating of a course
#[derive(Debug, Clone)]
pub struct RatingInput {
    pub course_id: i64,
    pub learner_id: i64,
    pub score: i64,
    pub comment: Option<String>,
}

/// Store a learner's rating of a course, overwriting any previous rating.
///
/// At most one rating exists per (course, learner). Scores outside 1..=5 are
/// rejected before touching storage. Transient failures are retried under
/// `policy`.
pub async fn upsert_course_rating(
    pool: &SqlitePool,
    policy: &RetryPolicy,
    input: &RatingInput,
) -> Result<UpsertOutcome<CourseRating>> {
    if !(1..=5).contains(&input.score) {
        return Err(Error::InvalidInput(format!(
            "Rating score must be between 1 and 5, got {}",
            input.score
        )));
    }

    retry::retry("course rating upsert", policy, || async move {
        let request = UpsertRequest {
            table: "course_ratings",
            record: vec![
                ("course_id", input.course_id.into()),
                ("learner_id", input.learner_id.into()),
                ("score", input.score.into()),
                ("comment", input.comment.clone().into()),
                ("reviewed_at", Utc::now().into()),
            ],
            conflict_keys: &["course_id", "learner_id"],
            update_fields: &["score", "comment", "reviewed_at"],
        };
        safe_upsert::<CourseRating>(pool, &request).await
    })
    .await
}
