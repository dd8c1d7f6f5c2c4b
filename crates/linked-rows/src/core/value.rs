//! SQL value types for database-agnostic row handling.
//!
//! Every cell read from a driver is materialized as a [`SqlValue`]. The enum
//! also serves as the bound-parameter representation: drivers adapt a value to
//! the concrete wire type of the prepared statement.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Type hint for NULL values so drivers can bind NULL with the right type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
}

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL with type hint for correct binding.
    Null(SqlNullType),

    /// Boolean value.
    Bool(bool),

    /// 16-bit signed integer (smallint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real/float4).
    F32(f32),

    /// 64-bit floating point (double precision/float8).
    F64(f64),

    /// Text/string data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Decimal value with arbitrary precision.
    Decimal(Decimal),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Check if this value is an integral number.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(self, SqlValue::I16(_) | SqlValue::I32(_) | SqlValue::I64(_))
    }

    /// Extract the value as `i64` if it is integral.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I16(v) => Some(i64::from(*v)),
            SqlValue::I32(v) => Some(i64::from(*v)),
            SqlValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Normalize for row identity: integral widths collapse to `I64`, every
    /// other value stays as-is and compares by [`canonical_text`].
    ///
    /// This guarantees that `(table, 7_i32)` and `(table, 7_i64)` identify the
    /// same row.
    ///
    /// [`canonical_text`]: SqlValue::canonical_text
    #[must_use]
    pub fn normalized(self) -> SqlValue {
        match self {
            SqlValue::I16(v) => SqlValue::I64(i64::from(v)),
            SqlValue::I32(v) => SqlValue::I64(i64::from(v)),
            other => other,
        }
    }

    /// Stable textual form used for identity comparison, diagnostics and
    /// content hashing.
    #[must_use]
    pub fn canonical_text(&self) -> String {
        match self {
            SqlValue::Null(_) => "null".to_string(),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::I16(v) => v.to_string(),
            SqlValue::I32(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F32(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::Text(v) => v.clone(),
            SqlValue::Bytes(v) => hex_encode(v),
            SqlValue::Uuid(v) => v.hyphenated().to_string(),
            SqlValue::Decimal(v) => v.normalize().to_string(),
            SqlValue::DateTime(v) => v.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            SqlValue::DateTimeOffset(v) => v.to_rfc3339(),
            SqlValue::Date(v) => v.format("%Y-%m-%d").to_string(),
            SqlValue::Time(v) => v.format("%H:%M:%S%.f").to_string(),
        }
    }

    /// Get the [`SqlNullType`] for this value (for type-aware NULL binding).
    #[must_use]
    pub fn null_type(&self) -> SqlNullType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::Bool(_) => SqlNullType::Bool,
            SqlValue::I16(_) => SqlNullType::I16,
            SqlValue::I32(_) => SqlNullType::I32,
            SqlValue::I64(_) => SqlNullType::I64,
            SqlValue::F32(_) => SqlNullType::F32,
            SqlValue::F64(_) => SqlNullType::F64,
            SqlValue::Text(_) => SqlNullType::String,
            SqlValue::Bytes(_) => SqlNullType::Bytes,
            SqlValue::Uuid(_) => SqlNullType::Uuid,
            SqlValue::Decimal(_) => SqlNullType::Decimal,
            SqlValue::DateTime(_) => SqlNullType::DateTime,
            SqlValue::DateTimeOffset(_) => SqlNullType::DateTimeOffset,
            SqlValue::Date(_) => SqlNullType::Date,
            SqlValue::Time(_) => SqlNullType::Time,
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::I16(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_collapses_integral_widths() {
        assert_eq!(SqlValue::I16(7).normalized(), SqlValue::I64(7));
        assert_eq!(SqlValue::I32(7).normalized(), SqlValue::I64(7));
        assert_eq!(SqlValue::I64(7).normalized(), SqlValue::I64(7));
    }

    #[test]
    fn test_normalized_is_idempotent() {
        let v = SqlValue::I32(42).normalized();
        assert_eq!(v.clone().normalized(), v);

        let s = SqlValue::Text("abc".into()).normalized();
        assert_eq!(s.clone().normalized(), s);
    }

    #[test]
    fn test_canonical_text_agrees_across_widths() {
        assert_eq!(SqlValue::I16(7).canonical_text(), "7");
        assert_eq!(SqlValue::I64(7).canonical_text(), "7");
        assert_eq!(SqlValue::Null(SqlNullType::String).canonical_text(), "null");
    }

    #[test]
    fn test_canonical_text_decimal_trailing_zeros() {
        let a = SqlValue::Decimal("1.50".parse().unwrap());
        let b = SqlValue::Decimal("1.5".parse().unwrap());
        assert_eq!(a.canonical_text(), b.canonical_text());
    }

    #[test]
    fn test_hex_encode_bytes() {
        assert_eq!(SqlValue::Bytes(vec![0xde, 0xad, 0x01]).canonical_text(), "dead01");
    }

    #[test]
    fn test_is_null() {
        assert!(SqlValue::Null(SqlNullType::I64).is_null());
        assert!(!SqlValue::I64(0).is_null());
    }
}
