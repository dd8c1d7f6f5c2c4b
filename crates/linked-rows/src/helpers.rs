//! Statement-building helpers for downstream importers.
//!
//! The exporter never inserts, but the insert contract belongs to the
//! metadata it exposes: a column whose default expression carries a type cast
//! (an enum default like `'G'::mood`) cannot be inserted through a plain
//! placeholder, so the cast is kept around the placeholder.

use crate::cache::MetadataCache;
use crate::coerce::coerce;
use crate::core::ColumnMetadata;
use crate::driver::Connection;
use crate::error::{ExportError, Result};
use crate::probe::{self, find_column};
use crate::reader::read_by_column;

/// Placeholder for one inserted column: `?`, or the column's default-derived
/// cast with the literal replaced (`'G'::mood` -> `?::mood`).
pub fn placeholder_or_cast(metadata: Option<&ColumnMetadata>) -> String {
    if let Some(meta) = metadata {
        if let Some(default_expr) = &meta.default_expr {
            // MySQL reports CURRENT_TIMESTAMP as the default of timestamp
            // columns; that is an auto-set field, not a cast.
            if default_expr.ends_with(&meta.type_name) && default_expr != "CURRENT_TIMESTAMP" {
                if let Some(pos) = default_expr.find("::") {
                    return format!("?{}", &default_expr[pos..]);
                }
            }
        }
    }
    "?".to_string()
}

/// INSERT statement text for the given columns, placeholders in ordinal order.
pub fn insert_statement(
    table: &str,
    column_names: &[String],
    column_metadata: &[ColumnMetadata],
) -> String {
    let fields = column_names.join(", ");

    let placeholders: Vec<String> = column_names
        .iter()
        .map(|n| {
            placeholder_or_cast(column_metadata.iter().find(|m| m.name.eq_ignore_ascii_case(n)))
        })
        .collect();

    format!(
        "insert into {} ({}) values ({})",
        table,
        fields,
        placeholders.join(", ")
    )
}

/// UPDATE statement text: every non-pk column in the set list, pk in the
/// WHERE clause.
pub fn update_statement(table: &str, column_names: &[String], pk_name: &str) -> String {
    let set_list: Vec<String> = column_names
        .iter()
        .filter(|n| !n.eq_ignore_ascii_case(pk_name))
        .map(|n| format!("{} = ?", n))
        .collect();

    format!(
        "update {} set {} where {} = ?",
        table,
        set_list.join(", "),
        pk_name
    )
}

/// Does a row with these primary-key values exist? Composite-key safe: the
/// first pk column is queried, the remaining columns are compared on the
/// returned rows.
pub async fn row_exists(
    conn: &dyn Connection,
    cache: &MetadataCache,
    table: &str,
    pk_values: &[String],
) -> Result<bool> {
    let pks = probe::primary_keys(conn, cache, table).await?;
    if pks.is_empty() {
        return Err(ExportError::PrimaryKeyMissing(table.to_string()));
    }
    if pks.len() != pk_values.len() {
        return Err(ExportError::metadata(
            table,
            format!(
                "expected {} primary key values, got {}",
                pks.len(),
                pk_values.len()
            ),
        ));
    }

    let columns = probe::column_metadata(conn, cache, table).await?;
    let candidates = read_by_column(conn, cache, table, &pks[0], &pk_values[0]).await?;

    Ok(candidates.iter().any(|record| {
        pks.iter().zip(pk_values).all(|(pk, value)| {
            let expected = find_column(&columns, pk)
                .and_then(|meta| coerce(&meta.type_name, Some(meta), value).ok())
                .map(|v| v.normalized().canonical_text());
            match (record.find_cell(pk), expected) {
                (Some(cell), Some(expected)) => {
                    cell.value.clone().normalized().canonical_text() == expected
                }
                _ => false,
            }
        })
    }))
}
