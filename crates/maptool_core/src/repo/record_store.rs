//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist business records of any entity kind keyed by `id`.
//! - Offer the three operations the core relies on: insert-or-replace,
//!   filtered/ordered fetch and filtered delete, plus the used-id scan that
//!   feeds group id allocation.
//!
//! # Invariants
//! - Every record kind declares its column list; query columns outside that
//!   list are rejected before any SQL is built.
//! - The first declared column is the `id` key.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::entity::EntityId;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key column shared by every record table.
pub const ID_COLUMN: &str = "id";

pub type RepoResult<T> = Result<T, RepoError>;

/// Record store error.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Query names a column the record kind does not declare.
    UnknownColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be decoded into a record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "record store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "record store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "record store requires column `{column}` in table `{table}`"
            ),
            Self::UnknownColumn { table, column } => {
                write!(f, "table `{table}` has no column `{column}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted record: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Business record persisted in one table.
pub trait StoredRecord: Sized {
    const TABLE: &'static str;
    /// Ordered column list; must start with `id`.
    const COLUMNS: &'static [&'static str];

    fn record_id(&self) -> EntityId;
    /// Values in `COLUMNS` order.
    fn to_values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
}

/// AND-combined filters plus an ordered list of sort keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    filters: Vec<Filter>,
    order_by: Vec<(&'static str, SortOrder)>,
}

impl RecordQuery {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    pub fn where_in<V: Into<Value>>(
        mut self,
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(Filter::In(
            column,
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn order_by(mut self, column: &'static str, order: SortOrder) -> Self {
        self.order_by.push((column, order));
        self
    }

    fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.filters
            .iter()
            .map(|filter| match filter {
                Filter::Eq(column, _) | Filter::In(column, _) => *column,
            })
            .chain(self.order_by.iter().map(|(column, _)| *column))
    }

    fn validate_for<R: StoredRecord>(&self) -> RepoResult<()> {
        for column in self.columns() {
            if !R::COLUMNS.contains(&column) {
                return Err(RepoError::UnknownColumn {
                    table: R::TABLE,
                    column,
                });
            }
        }
        Ok(())
    }

    fn where_sql(&self) -> (String, Vec<Value>) {
        if self.filters.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut clauses = Vec::with_capacity(self.filters.len());
        let mut values = Vec::new();
        for filter in &self.filters {
            match filter {
                Filter::Eq(column, value) => {
                    clauses.push(format!("{column} = ?"));
                    values.push(value.clone());
                }
                Filter::In(column, items) => {
                    let placeholders = vec!["?"; items.len()].join(", ");
                    clauses.push(format!("{column} IN ({placeholders})"));
                    values.extend(items.iter().cloned());
                }
            }
        }
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }

    fn order_sql(&self) -> String {
        if self.order_by.is_empty() {
            return String::new();
        }
        let keys = self
            .order_by
            .iter()
            .map(|(column, order)| match order {
                SortOrder::Asc => format!("{column} ASC"),
                SortOrder::Desc => format!("{column} DESC"),
            })
            .collect::<Vec<_>>();
        format!(" ORDER BY {}", keys.join(", "))
    }
}

/// Persistence contract the entity core relies on.
pub trait RecordStore {
    fn insert_or_replace<R: StoredRecord>(&self, record: &R) -> RepoResult<()>;
    fn get_where<R: StoredRecord>(&self, query: &RecordQuery) -> RepoResult<Vec<R>>;
    /// Returns the number of deleted rows.
    fn delete_where<R: StoredRecord>(&self, query: &RecordQuery) -> RepoResult<usize>;
    /// Every id stored for `R`, across all maps.
    fn used_ids<R: StoredRecord>(&self) -> RepoResult<HashSet<EntityId>>;
}

/// SQLite-backed record store.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Wraps a connection whose schema is at the latest migration.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Checks that the table for `R` exists with every declared column.
    pub fn ensure_table<R: StoredRecord>(&self) -> RepoResult<()> {
        if !table_exists(self.conn, R::TABLE)? {
            return Err(RepoError::MissingRequiredTable(R::TABLE));
        }
        let present = table_columns(self.conn, R::TABLE)?;
        for column in R::COLUMNS.iter().copied() {
            if !present.iter().any(|current| current == column) {
                return Err(RepoError::MissingRequiredColumn {
                    table: R::TABLE,
                    column,
                });
            }
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        self.conn
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn insert_or_replace<R: StoredRecord>(&self, record: &R) -> RepoResult<()> {
        let placeholders = vec!["?"; R::COLUMNS.len()].join(", ");
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({placeholders});",
            R::TABLE,
            R::COLUMNS.join(", ")
        );
        self.conn.execute(&sql, params_from_iter(record.to_values()))?;
        Ok(())
    }

    fn get_where<R: StoredRecord>(&self, query: &RecordQuery) -> RepoResult<Vec<R>> {
        query.validate_for::<R>()?;
        let (where_sql, values) = query.where_sql();
        let sql = format!(
            "SELECT {} FROM {}{where_sql}{};",
            R::COLUMNS.join(", "),
            R::TABLE,
            query.order_sql()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(R::from_row(row)?);
        }
        Ok(records)
    }

    fn delete_where<R: StoredRecord>(&self, query: &RecordQuery) -> RepoResult<usize> {
        query.validate_for::<R>()?;
        let (where_sql, values) = query.where_sql();
        let sql = format!("DELETE FROM {}{where_sql};", R::TABLE);
        let deleted = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(deleted)
    }

    fn used_ids<R: StoredRecord>(&self) -> RepoResult<HashSet<EntityId>> {
        let sql = format!("SELECT {ID_COLUMN} FROM {};", R::TABLE);
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, EntityId>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::{RecordQuery, SortOrder};

    #[test]
    fn query_builds_where_and_order_clauses() {
        let query = RecordQuery::all()
            .where_eq("map_id", 3)
            .where_in("zone_id", [1, 2])
            .order_by("actor_type", SortOrder::Asc)
            .order_by("id", SortOrder::Desc);

        let (where_sql, values) = query.where_sql();
        assert_eq!(where_sql, " WHERE map_id = ? AND zone_id IN (?, ?)");
        assert_eq!(values.len(), 3);
        assert_eq!(query.order_sql(), " ORDER BY actor_type ASC, id DESC");
    }

    #[test]
    fn empty_query_has_no_clauses() {
        let query = RecordQuery::all();
        assert_eq!(query.where_sql().0, "");
        assert_eq!(query.order_sql(), "");
    }
}
