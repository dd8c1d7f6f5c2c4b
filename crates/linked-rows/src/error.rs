//! Error types for the export library.

use thiserror::Error;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The requested root table does not exist in the database.
    #[error("Table {0} does not exist")]
    TableNotFound(String),

    /// The target table has no primary-key column (the walker needs one).
    #[error("Table {0} has no primary key")]
    PrimaryKeyMissing(String),

    /// A catalog query failed or returned malformed data.
    #[error("Metadata error for {table}: {message}")]
    Metadata { table: String, message: String },

    /// A parameterized SELECT failed.
    #[error("Query failed on table {table}: {message}")]
    Query { table: String, message: String },

    /// A cell value could not be bound to its declared column type.
    #[error("Cannot coerce {value:?} to type {type_name}")]
    Coercion { type_name: String, value: String },

    /// The dependency orderer found a cycle and strict mode was requested.
    #[error("Cyclic table dependencies - aborting: {0}")]
    CyclicDependencies(String),

    /// The driver factory has no driver for the requested dialect name.
    #[error("Unknown database dialect: {0}")]
    UnknownDialect(String),

    /// Cooperative cancellation was observed mid-traversal.
    #[error("Export cancelled")]
    Cancelled,

    /// PostgreSQL driver error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL driver error.
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (connection setup).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Create a Metadata error for a table.
    pub fn metadata(table: impl Into<String>, message: impl Into<String>) -> Self {
        ExportError::Metadata {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Query error for a table.
    pub fn query(table: impl Into<String>, message: impl Into<String>) -> Self {
        ExportError::Query {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Stable process exit code per error kind (used by the CLI).
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::TableNotFound(_) => 2,
            ExportError::PrimaryKeyMissing(_) => 3,
            ExportError::Metadata { .. } => 4,
            ExportError::Query { .. } => 5,
            ExportError::Coercion { .. } => 6,
            ExportError::CyclicDependencies(_) => 8,
            ExportError::UnknownDialect(_) => 9,
            ExportError::Cancelled => 10,
            _ => 1,
        }
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
