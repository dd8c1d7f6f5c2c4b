//! Schema probe: catalog lookups with per-dialect case adaptation.
//!
//! Every operation takes the caller's table name in whatever case, adapts it
//! for the dialect's catalog, and returns identifiers lowercased. The cached
//! variants go through [`MetadataCache`]; failed probes are never cached.

use tracing::debug;

use crate::cache::MetadataCache;
use crate::core::{ColumnMetadata, Fk};
use crate::driver::Connection;
use crate::error::{ExportError, Result};

/// Fail with [`ExportError::TableNotFound`] unless the table exists.
pub async fn assert_table_exists(conn: &dyn Connection, table: &str) -> Result<()> {
    let adapted = conn.dialect().adapt_case(table);
    if conn
        .table_exists(&adapted)
        .await
        .map_err(|e| metadata_error(table, e))?
    {
        Ok(())
    } else {
        Err(ExportError::TableNotFound(table.to_string()))
    }
}

/// Catalog failures keep their structured kind; raw driver errors become
/// [`ExportError::Metadata`] naming the failing table.
fn metadata_error(table: &str, err: ExportError) -> ExportError {
    match err {
        e @ (ExportError::Metadata { .. }
        | ExportError::TableNotFound(_)
        | ExportError::PrimaryKeyMissing(_)
        | ExportError::Cancelled) => e,
        other => ExportError::metadata(table, other.to_string()),
    }
}

/// Column metadata ordered by ordinal position, names lowercased.
pub async fn column_metadata(
    conn: &dyn Connection,
    cache: &MetadataCache,
    table: &str,
) -> Result<Vec<ColumnMetadata>> {
    let key = table.to_lowercase();
    if let Some(hit) = cache.columns.get(&key) {
        return Ok(hit);
    }

    let adapted = conn.dialect().adapt_case(table);
    let mut columns = conn
        .column_metadata(&adapted)
        .await
        .map_err(|e| metadata_error(table, e))?;
    columns.sort_by_key(|c| c.ordinal_pos);

    debug!("Probed {} columns for {}", columns.len(), key);
    cache.columns.insert(key, columns.clone());
    Ok(columns)
}

/// Primary-key column names in declared order, lowercased.
pub async fn primary_keys(
    conn: &dyn Connection,
    cache: &MetadataCache,
    table: &str,
) -> Result<Vec<String>> {
    let key = table.to_lowercase();
    if let Some(hit) = cache.pks.get(&key) {
        return Ok(hit);
    }

    let adapted = conn.dialect().adapt_case(table);
    let pks: Vec<String> = conn
        .primary_keys(&adapted)
        .await
        .map_err(|e| metadata_error(table, e))?
        .into_iter()
        .map(|c| c.to_lowercase())
        .collect();

    debug!("Primary keys for {}: {:?}", key, pks);
    cache.pks.insert(key, pks.clone());
    Ok(pks)
}

/// FK metadata of one table, both directions: exported keys first
/// (`inverted = false`), then imported keys (`inverted = true`).
pub async fn foreign_keys_of(
    conn: &dyn Connection,
    cache: &MetadataCache,
    table: &str,
) -> Result<Vec<Fk>> {
    let key = table.to_lowercase();
    if let Some(hit) = cache.fks.get(&key) {
        return Ok(hit);
    }

    let adapted = conn.dialect().adapt_case(table);
    let mut fks = conn
        .exported_keys(&adapted)
        .await
        .map_err(|e| metadata_error(table, e))?;
    fks.extend(
        conn.imported_keys(&adapted)
            .await
            .map_err(|e| metadata_error(table, e))?,
    );

    debug!("Probed {} fk edges for {}", fks.len(), key);
    cache.fks.insert(key, fks.clone());
    Ok(fks)
}

/// Look up a column's metadata case-insensitively.
pub fn find_column<'a>(columns: &'a [ColumnMetadata], name: &str) -> Option<&'a ColumnMetadata> {
    columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}
