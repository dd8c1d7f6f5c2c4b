//! Core data model: values, schema metadata, records, identifiers.

pub mod identifier;
pub mod record;
pub mod schema;
pub mod value;

pub use identifier::{validate_identifier, Dialect};
pub use record::{Cell, ExportContext, Record, RowLink};
pub use schema::{ColumnMetadata, Fk, SqlTypeCode};
pub use value::{SqlNullType, SqlValue};
