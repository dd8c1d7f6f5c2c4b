//! # linked-rows
//!
//! Export a connected subgraph of relational-database rows - rooted at one row
//! identified by table name and primary-key value - as a self-contained,
//! hierarchically nested record tree.
//!
//! The walker follows foreign-key edges in both directions (the row's parents
//! and its children), keeps a visited set keyed by normalized (table, pk) so
//! cyclic row graphs terminate, and honors stop-table allow/deny lists. A
//! companion pass rewrites surrogate primary keys into content-derived values
//! so two exports of equivalent data compare equal.
//!
//! ## Example
//!
//! ```rust,no_run
//! use linked_rows::{driver, json, Exporter};
//!
//! #[tokio::main]
//! async fn main() -> linked_rows::Result<()> {
//!     let conn = driver::connect("postgres", "postgres://localhost/demo", "postgres", "admin").await?;
//!     let record = Exporter::new().export(conn.as_ref(), "blogpost", "2").await?;
//!     println!("{}", serde_json::to_string_pretty(&json::to_json(&record))?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod canon;
pub mod coerce;
pub mod core;
pub mod driver;
pub mod error;
pub mod export;
pub mod helpers;
pub mod json;
pub mod order;
pub mod probe;
pub mod reader;

// Re-exports for convenient access
pub use cache::{BoundedCache, MetadataCache, DEFAULT_CACHE_CAPACITY};
pub use canon::canonicalize_ids;
pub use crate::core::{
    Cell, ColumnMetadata, Dialect, ExportContext, Fk, Record, RowLink, SqlNullType, SqlTypeCode,
    SqlValue,
};
pub use driver::{connect, Connection, RawRow};
pub use error::{ExportError, Result};
pub use export::Exporter;
pub use json::{to_json, SUB_ROW_KEY};
pub use order::{determine_insertion_order, determine_insertion_order_cached, DependencyGraph};
