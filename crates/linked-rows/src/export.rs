//! The graph walker: exports the connected row graph around one root row.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::MetadataCache;
use crate::core::{ExportContext, Record, SqlValue};
use crate::driver::Connection;
use crate::error::{ExportError, Result};
use crate::probe;
use crate::reader::read_by_column;

/// Exports a root row and everything transitively linked to it over FK edges,
/// in both directions, as one nested record tree.
///
/// ```no_run
/// use linked_rows::{driver, Exporter};
///
/// # async fn demo() -> linked_rows::Result<()> {
/// let conn = driver::connect("postgres", "postgres://localhost/demo", "postgres", "admin").await?;
/// let exporter = Exporter::new().with_stop_tables_excluded(["audit_log"]);
/// let record = exporter.export(conn.as_ref(), "blogpost", "2").await?;
/// println!("{}", serde_json::to_string_pretty(&linked_rows::json::to_json(&record))?);
/// # Ok(())
/// # }
/// ```
pub struct Exporter {
    stop_tables_included: HashSet<String>,
    stop_tables_excluded: HashSet<String>,
    cache: Arc<MetadataCache>,
    cancel: CancellationToken,
}

impl Exporter {
    pub fn new() -> Self {
        Exporter {
            stop_tables_included: HashSet::new(),
            stop_tables_excluded: HashSet::new(),
            cache: Arc::new(MetadataCache::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Deny-list: tables never recursed into. Applied before the allow-list.
    pub fn with_stop_tables_excluded<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stop_tables_excluded
            .extend(tables.into_iter().map(|t| t.as_ref().to_lowercase()));
        self
    }

    /// Allow-list: when non-empty, only these tables are recursed into.
    pub fn with_stop_tables_included<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stop_tables_included
            .extend(tables.into_iter().map(|t| t.as_ref().to_lowercase()));
        self
    }

    /// Share metadata caches across exports (on distinct connections).
    pub fn with_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Observe cooperative cancellation: the walker surfaces
    /// [`ExportError::Cancelled`] at the next suspension point.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The caches this exporter populates; reusable for canonicalization.
    pub fn cache(&self) -> Arc<MetadataCache> {
        Arc::clone(&self.cache)
    }

    /// Export the row of `table` whose first primary-key column equals
    /// `pk_value`, plus every row transitively reachable over FK edges.
    pub async fn export(
        &self,
        conn: &dyn Connection,
        table: &str,
        pk_value: &str,
    ) -> Result<Record> {
        self.check_cancelled()?;
        probe::assert_table_exists(conn, table).await?;

        let pks = probe::primary_keys(conn, &self.cache, table).await?;
        let pk_name = pks
            .first()
            .cloned()
            .ok_or_else(|| ExportError::PrimaryKeyMissing(table.to_string()))?;

        let mut rows = read_by_column(conn, &self.cache, table, &pk_name, pk_value).await?;
        let mut record = match rows.drain(..).next() {
            Some(row) => row,
            // No matching row: an empty record keyed by the requested pk.
            None => Record::new(table, parse_pk_text(pk_value)),
        };

        let mut ctx = ExportContext::default();
        ctx.visited.insert(record.row_link.clone());

        self.expand(conn, &mut record, &mut ctx).await?;

        debug!(
            "Exported {} rows over {} fk edges from {}/{}",
            ctx.visited.len(),
            ctx.treated_fks.len(),
            record.table,
            pk_value
        );
        record.export_context = Some(Box::new(ctx));
        Ok(record)
    }

    /// Recursively attach sub-rows reachable from `record` over FK edges.
    fn expand<'a>(
        &'a self,
        conn: &'a dyn Connection,
        record: &'a mut Record,
        ctx: &'a mut ExportContext,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let table = record.table.clone();
            let fks = probe::foreign_keys_of(conn, &self.cache, &table).await?;

            for fk in fks {
                self.check_cancelled()?;
                ctx.treated_fks.insert(fk.clone());

                let driving = fk.driving_column().to_string();
                let driving_value = match record.find_cell(&driving) {
                    Some(cell) if !cell.value.is_null() => cell.value.clone(),
                    _ => continue,
                };

                let other_table = fk.other_table().to_string();
                let other_column = fk.other_column().to_string();

                if !self.is_traversable(&other_table) {
                    continue;
                }
                if ctx.contains_node(&other_table, &driving_value) {
                    // Termination: that side of the edge was already walked.
                    continue;
                }

                let sub_rows = read_by_column(
                    conn,
                    &self.cache,
                    &other_table,
                    &other_column,
                    &driving_value.canonical_text(),
                )
                .await?;

                let mut attached = Vec::with_capacity(sub_rows.len());
                for mut sub in sub_rows {
                    // A row seen through another edge is still attached here,
                    // but its own sub-rows are not expanded again.
                    let already_visited = !ctx.visited.insert(sub.row_link.clone());
                    if !already_visited {
                        self.expand(conn, &mut sub, ctx).await?;
                    }
                    attached.push(sub);
                }

                if let Some(cell) = record.find_cell_mut(&driving) {
                    cell.sub_rows.insert(other_table, attached);
                }
            }

            Ok(())
        }
        .boxed()
    }

    fn is_traversable(&self, table: &str) -> bool {
        let key = table.to_lowercase();
        if self.stop_tables_excluded.contains(&key) {
            return false;
        }
        if !self.stop_tables_included.is_empty() && !self.stop_tables_included.contains(&key) {
            return false;
        }
        true
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a textual pk the same way [`crate::core::RowLink::parse`] treats
/// short-form tails: integer-shaped text becomes an integer.
fn parse_pk_text(pk_value: &str) -> SqlValue {
    match pk_value.parse::<i64>() {
        Ok(n) => SqlValue::I64(n),
        Err(_) => SqlValue::Text(pk_value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_table_policy_excluded_before_included() {
        let exporter = Exporter::new()
            .with_stop_tables_included(["comment", "author"])
            .with_stop_tables_excluded(["Comment"]);

        assert!(!exporter.is_traversable("comment"));
        assert!(exporter.is_traversable("author"));
        assert!(!exporter.is_traversable("blogpost"));
    }

    #[test]
    fn test_no_stop_tables_means_unconstrained() {
        let exporter = Exporter::new();
        assert!(exporter.is_traversable("anything"));
    }

    #[test]
    fn test_parse_pk_text() {
        assert_eq!(parse_pk_text("7"), SqlValue::I64(7));
        assert_eq!(parse_pk_text("ab"), SqlValue::Text("ab".into()));
    }

    #[test]
    fn test_cancelled_exporter_fails_fast() {
        let token = CancellationToken::new();
        token.cancel();
        let exporter = Exporter::new().with_cancellation(token);
        assert!(matches!(
            exporter.check_cancelled(),
            Err(ExportError::Cancelled)
        ));
    }
}
