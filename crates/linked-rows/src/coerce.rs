//! Value coercion: textual cell values to typed bound parameters.
//!
//! Pure given column metadata; performs no I/O. Drivers take the resulting
//! [`SqlValue`] and adapt it to the concrete wire type of the statement.

use chrono::{NaiveDate, NaiveDateTime};

use crate::core::{ColumnMetadata, SqlNullType, SqlTypeCode, SqlValue};
use crate::error::{ExportError, Result};

/// Coerce a textual value to a [`SqlValue`] matching the declared column type.
///
/// Empty, whitespace-only, or the literal `"null"` become a typed SQL NULL.
/// Dispatch is case-insensitive on the declared type name.
pub fn coerce(type_name: &str, metadata: Option<&ColumnMetadata>, value: &str) -> Result<SqlValue> {
    let is_empty = value.trim().is_empty() || value == "null";
    let upper = type_name.to_uppercase();

    match upper.as_str() {
        "BOOLEAN" | "BOOL" => {
            if is_empty {
                Ok(SqlValue::Null(SqlNullType::Bool))
            } else {
                Ok(SqlValue::Bool(value.trim().eq_ignore_ascii_case("true")))
            }
        }
        "SERIAL" | "INT" | "INT2" | "INT4" | "INTEGER" | "NUMBER" | "INT8" | "FLOAT4"
        | "FLOAT8" => {
            if is_empty {
                Ok(SqlValue::Null(SqlNullType::I64))
            } else {
                value
                    .trim()
                    .parse::<i64>()
                    .map(SqlValue::I64)
                    .map_err(|_| coercion_error(type_name, value))
            }
        }
        "NUMERIC" | "DECIMAL" => {
            if is_empty {
                Ok(SqlValue::Null(SqlNullType::Decimal))
            } else {
                value
                    .trim()
                    .parse::<f64>()
                    .map(SqlValue::F64)
                    .map_err(|_| coercion_error(type_name, value))
            }
        }
        "DATE" | "TIMESTAMP" => {
            if is_empty {
                return Ok(SqlValue::Null(SqlNullType::DateTime));
            }
            let normalized = value.replace(' ', "T");
            if upper == "TIMESTAMP" {
                NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(SqlValue::DateTime)
                    .map_err(|_| coercion_error(type_name, value))
            } else {
                NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
                    .map(SqlValue::Date)
                    .map_err(|_| coercion_error(type_name, value))
            }
        }
        _ => {
            // Fallback: carry the text through, typed by the catalog code when
            // one is available and the column is not an array.
            let hint = match metadata {
                Some(meta) if meta.type_code != SqlTypeCode::Array => null_hint(meta.type_code),
                _ => SqlNullType::String,
            };
            if is_empty {
                Ok(SqlValue::Null(hint))
            } else {
                Ok(SqlValue::Text(value.to_string()))
            }
        }
    }
}

/// Map a coarse type code to the NULL hint drivers use for binding.
pub fn null_hint(code: SqlTypeCode) -> SqlNullType {
    match code {
        SqlTypeCode::Boolean => SqlNullType::Bool,
        SqlTypeCode::Int => SqlNullType::I64,
        SqlTypeCode::Float => SqlNullType::F64,
        SqlTypeCode::Numeric => SqlNullType::Decimal,
        SqlTypeCode::Date => SqlNullType::Date,
        SqlTypeCode::Timestamp => SqlNullType::DateTime,
        SqlTypeCode::Bytes => SqlNullType::Bytes,
        SqlTypeCode::Uuid => SqlNullType::Uuid,
        _ => SqlNullType::String,
    }
}

fn coercion_error(type_name: &str, value: &str) -> ExportError {
    ExportError::Coercion {
        type_name: type_name.to_string(),
        value: value.to_string(),
    }
}
