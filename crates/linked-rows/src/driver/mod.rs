//! Driver abstraction: a live connection to one database.
//!
//! The engine talks to every database through the [`Connection`] trait; the
//! factory [`connect`] resolves a short dialect name to a concrete driver.
//! One export owns one connection for its whole duration.

use async_trait::async_trait;

use crate::core::{ColumnMetadata, Dialect, Fk, SqlValue};
use crate::error::{ExportError, Result};

pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

/// One result row as the driver materializes it: ordered (name, value) pairs.
pub type RawRow = Vec<(String, SqlValue)>;

/// A live connection to one database.
///
/// Table names passed to catalog operations are already case-adapted by the
/// probe layer; implementations quote identifiers themselves when issuing SQL.
#[async_trait]
pub trait Connection: Send + Sync {
    /// The dialect this connection speaks.
    fn dialect(&self) -> Dialect;

    /// Whether the catalog knows a table of this (case-adapted) name.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Column metadata for a table, ordered by ordinal position.
    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnMetadata>>;

    /// Primary-key column names in the catalog's declared order.
    async fn primary_keys(&self, table: &str) -> Result<Vec<String>>;

    /// FK constraints where this table is the referenced (parent) side.
    async fn exported_keys(&self, table: &str) -> Result<Vec<Fk>>;

    /// FK constraints where this table is the referencing (child) side.
    async fn imported_keys(&self, table: &str) -> Result<Vec<Fk>>;

    /// `SELECT * FROM table WHERE column = ?` with one bound parameter.
    async fn select_eq(&self, table: &str, column: &str, value: &SqlValue) -> Result<Vec<RawRow>>;
}

/// Open a connection for a short dialect name (`postgres`, `mysql`, ...).
///
/// Dialects without a driver (`h2` included) yield
/// [`ExportError::UnknownDialect`].
pub async fn connect(
    short_name: &str,
    url: &str,
    user: &str,
    password: &str,
) -> Result<Box<dyn Connection>> {
    match Dialect::from_short_name(short_name) {
        Dialect::Postgres => {
            let conn = postgres::PostgresConnection::connect(url, user, password).await?;
            Ok(Box::new(conn))
        }
        #[cfg(feature = "mysql")]
        Dialect::Mysql => {
            let conn = mysql::MysqlConnection::connect(url, user, password).await?;
            Ok(Box::new(conn))
        }
        _ => Err(ExportError::UnknownDialect(short_name.to_string())),
    }
}
