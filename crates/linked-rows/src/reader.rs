//! Row reader: parameterized single-column SELECTs materialized as records.

use crate::cache::MetadataCache;
use crate::coerce::coerce;
use crate::core::{Cell, Record, SqlNullType, SqlValue};
use crate::driver::Connection;
use crate::error::{ExportError, Result};
use crate::probe::{self, find_column};

/// Read all rows of `table` where `column = value`, as records.
///
/// The textual value is coerced to the queried column's declared type before
/// binding. Each row's primary-key cell (the first PK column) is promoted to
/// the record's row link after normalization.
pub async fn read_by_column(
    conn: &dyn Connection,
    cache: &MetadataCache,
    table: &str,
    column: &str,
    value: &str,
) -> Result<Vec<Record>> {
    let columns = probe::column_metadata(conn, cache, table).await?;
    let pks = probe::primary_keys(conn, cache, table).await?;
    let pk_name = pks
        .first()
        .ok_or_else(|| ExportError::PrimaryKeyMissing(table.to_string()))?;

    let column = column.to_lowercase();
    let meta = find_column(&columns, &column)
        .ok_or_else(|| ExportError::metadata(table, format!("unknown column {}", column)))?;
    let bound = coerce(&meta.type_name, Some(meta), value)?;

    let adapted = conn.dialect().adapt_case(table);
    let raw_rows = conn
        .select_eq(&adapted, &column, &bound)
        .await
        .map_err(|e| match e {
            cancel @ ExportError::Cancelled => cancel,
            other => ExportError::query(table, other.to_string()),
        })?;

    let mut records = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        let mut record = Record::new(table, SqlValue::Null(SqlNullType::String));
        for (name, value) in raw {
            let cell_meta = find_column(&columns, &name).cloned();
            if name.eq_ignore_ascii_case(pk_name) {
                record.set_pk_value(value.clone());
            }
            record.cells.push(Cell::new(&name, value, cell_meta));
        }
        records.push(record);
    }

    Ok(records)
}
