//! Identifier normalization, per-dialect case adaptation, and quoting.
//!
//! All identifiers are lowercased inside the engine. Catalog queries get the
//! table name re-cased per dialect, which removes a whole class of dialect
//! bugs (PostgreSQL folds unquoted identifiers to lowercase, H2 to uppercase).

use crate::error::{ExportError, Result};

/// Database dialect, parsed from a short name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    Mysql,
    H2,
    Other,
}

impl Dialect {
    /// Parse a short dialect name (`postgres`, `mysql`, `h2`, ...).
    pub fn from_short_name(name: &str) -> Dialect {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Dialect::Postgres,
            "mysql" | "mariadb" => Dialect::Mysql,
            "h2" => Dialect::H2,
            _ => Dialect::Other,
        }
    }

    /// Adapt a table name's case for catalog queries on this dialect.
    pub fn adapt_case(&self, original_name: &str) -> String {
        match self {
            Dialect::Postgres => original_name.to_lowercase(),
            Dialect::H2 => original_name.to_uppercase(),
            Dialect::Mysql => original_name.to_string(),
            Dialect::Other => original_name.to_uppercase(),
        }
    }

    /// Quote an identifier for use in SQL issued against this dialect.
    pub fn quote(&self, name: &str) -> Result<String> {
        validate_identifier(name)?;
        Ok(match self {
            Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        })
    }
}

/// Maximum identifier length (conservative limit across databases).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier before it is interpolated into SQL.
///
/// Identifiers cannot be passed as bound parameters, so dynamic table and
/// column selection requires interpolation; this rejects empty names, null
/// bytes, and oversized names.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ExportError::metadata("", "identifier cannot be empty"));
    }

    if name.contains('\0') {
        return Err(ExportError::metadata(
            name,
            "identifier contains a null byte",
        ));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ExportError::metadata(
            name,
            format!(
                "identifier exceeds maximum length of {} bytes",
                MAX_IDENTIFIER_LENGTH
            ),
        ));
    }

    Ok(())
}
