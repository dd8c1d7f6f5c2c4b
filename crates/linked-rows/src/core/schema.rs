//! Schema metadata types: columns and foreign-key edges.
//!
//! These are the driver-neutral shapes the probe layer produces and the
//! walker, orderer and canonicalizer consume. All identifiers are stored
//! lowercased; drivers keep the original case only while issuing SQL.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Coarse driver-neutral type code attached to column metadata.
///
/// Stands in for the catalog's numeric type codes; the value coercer keys its
/// fallback branches off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlTypeCode {
    Boolean,
    Int,
    Float,
    Numeric,
    Date,
    Timestamp,
    Text,
    Bytes,
    Uuid,
    Array,
    Json,
    Other,
}

impl SqlTypeCode {
    /// Classify a declared type name (e.g. `int4`, `varchar`, `_text`).
    pub fn from_type_name(type_name: &str) -> Self {
        let t = type_name.to_lowercase();
        if t.starts_with('_') || t.ends_with("[]") || t == "array" {
            return SqlTypeCode::Array;
        }
        match t.as_str() {
            "bool" | "boolean" | "bit" => SqlTypeCode::Boolean,
            "serial" | "bigserial" | "smallserial" | "int" | "int2" | "int4" | "int8"
            | "integer" | "smallint" | "bigint" | "tinyint" | "number" => SqlTypeCode::Int,
            "float4" | "float8" | "real" | "double" | "double precision" | "float" => {
                SqlTypeCode::Float
            }
            "numeric" | "decimal" => SqlTypeCode::Numeric,
            "date" => SqlTypeCode::Date,
            "timestamp" | "timestamptz" | "datetime" | "timestamp without time zone"
            | "timestamp with time zone" => SqlTypeCode::Timestamp,
            "text" | "varchar" | "char" | "bpchar" | "character varying" | "character"
            | "name" => SqlTypeCode::Text,
            "bytea" | "blob" | "binary" | "varbinary" => SqlTypeCode::Bytes,
            "uuid" => SqlTypeCode::Uuid,
            "json" | "jsonb" => SqlTypeCode::Json,
            _ => SqlTypeCode::Other,
        }
    }
}

/// Column metadata as reported by the driver catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name, lowercased.
    pub name: String,

    /// Declared type name as the catalog reports it (e.g. "int4", "varchar").
    pub type_name: String,

    /// Coarse type code derived from the declared type.
    pub type_code: SqlTypeCode,

    /// Source type code for distinct/user-defined types, when the catalog
    /// reports one.
    pub source_type_code: Option<SqlTypeCode>,

    /// Column size (length for strings, precision for numerics).
    pub size: Option<i32>,

    /// Default expression, when declared. Decides whether an INSERT needs a
    /// literal type cast instead of a plain placeholder.
    pub default_expr: Option<String>,

    /// Ordinal position, 1-based; determines statement parameter order.
    pub ordinal_pos: i32,
}

impl ColumnMetadata {
    /// Build metadata from a declared type name, deriving the type code.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, ordinal_pos: i32) -> Self {
        let type_name = type_name.into();
        let type_code = SqlTypeCode::from_type_name(&type_name);
        ColumnMetadata {
            name: name.into().to_lowercase(),
            type_name,
            type_code,
            source_type_code: None,
            size: None,
            default_expr: None,
            ordinal_pos,
        }
    }
}

/// A foreign-key edge between two tables.
///
/// The same physical constraint is observed twice: from the referenced table's
/// exported keys (`inverted = false`) and from the referencing table's
/// imported keys (`inverted = true`). Equality and hashing exclude `inverted`
/// so the two observations deduplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fk {
    /// Referenced (parent) table, lowercased.
    pub pk_table: String,

    /// Referenced column, lowercased.
    pub pk_column: String,

    /// Referencing (child) table, lowercased.
    pub fk_table: String,

    /// Referencing column, lowercased.
    pub fk_column: String,

    /// Constraint name, when the catalog reports one.
    pub constraint_name: Option<String>,

    /// Direction of discovery; excluded from equality.
    pub inverted: bool,
}

impl Fk {
    /// The table on the far side of this edge, seen from the side that
    /// discovered it.
    pub fn other_table(&self) -> &str {
        if self.inverted {
            &self.pk_table
        } else {
            &self.fk_table
        }
    }

    /// The column to filter on when reading the far side.
    pub fn other_column(&self) -> &str {
        if self.inverted {
            &self.pk_column
        } else {
            &self.fk_column
        }
    }

    /// The column on this side whose cell value drives the traversal.
    pub fn driving_column(&self) -> &str {
        if self.inverted {
            &self.fk_column
        } else {
            &self.pk_column
        }
    }
}

impl PartialEq for Fk {
    fn eq(&self, other: &Self) -> bool {
        self.pk_table == other.pk_table
            && self.pk_column == other.pk_column
            && self.fk_table == other.fk_table
            && self.fk_column == other.fk_column
            && self.constraint_name == other.constraint_name
    }
}

impl Eq for Fk {}

impl Hash for Fk {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pk_table.hash(state);
        self.pk_column.hash(state);
        self.fk_table.hash(state);
        self.fk_column.hash(state);
        self.constraint_name.hash(state);
    }
}

impl std::fmt::Display for Fk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Fk{{{}.{} <- {}.{}, inverted={}}}",
            self.pk_table, self.pk_column, self.fk_table, self.fk_column, self.inverted
        )
    }
}
