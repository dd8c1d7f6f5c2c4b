//! Shared in-memory database fixture implementing the driver trait.
//!
//! Schemas, rows, and FK constraints are declared up front; catalog and
//! SELECT behavior then mirrors a real driver closely enough to exercise the
//! probe, reader, walker, orderer, and canonicalizer end to end.

use async_trait::async_trait;
use std::collections::HashMap;

use linked_rows::{ColumnMetadata, Connection, Dialect, ExportError, Fk, RawRow, SqlValue};

#[derive(Clone)]
struct MemTable {
    columns: Vec<ColumnMetadata>,
    pks: Vec<String>,
    rows: Vec<RawRow>,
}

/// One FK constraint, stored once; both catalog directions derive from it.
#[derive(Clone)]
struct Constraint {
    pk_table: String,
    pk_column: String,
    fk_table: String,
    fk_column: String,
    name: String,
}

#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: HashMap<String, MemTable>,
    constraints: Vec<Constraint>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table with `(name, declared type)` columns and pk columns.
    pub fn table(mut self, name: &str, columns: &[(&str, &str)], pks: &[&str]) -> Self {
        let columns = columns
            .iter()
            .enumerate()
            .map(|(i, (col, ty))| ColumnMetadata::new(*col, *ty, i as i32 + 1))
            .collect();
        self.tables.insert(
            name.to_lowercase(),
            MemTable {
                columns,
                pks: pks.iter().map(|p| p.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    /// Declare an FK constraint: `fk_table.fk_column` references
    /// `pk_table.pk_column`.
    pub fn fk(mut self, fk_table: &str, fk_column: &str, pk_table: &str, pk_column: &str) -> Self {
        self.constraints.push(Constraint {
            pk_table: pk_table.to_lowercase(),
            pk_column: pk_column.to_lowercase(),
            fk_table: fk_table.to_lowercase(),
            fk_column: fk_column.to_lowercase(),
            name: format!("{}_{}_fkey", fk_table.to_lowercase(), fk_column.to_lowercase()),
        });
        self
    }

    /// Insert a row; values must be given in column order.
    pub fn row(mut self, table: &str, values: &[(&str, SqlValue)]) -> Self {
        let entry = self
            .tables
            .get_mut(&table.to_lowercase())
            .unwrap_or_else(|| panic!("fixture table {} not declared", table));
        entry
            .rows
            .push(values.iter().map(|(n, v)| (n.to_string(), v.clone())).collect());
        self
    }

    fn get(&self, table: &str) -> Result<&MemTable, ExportError> {
        self.tables
            .get(&table.to_lowercase())
            .ok_or_else(|| ExportError::metadata(table, "no such fixture table"))
    }
}

#[async_trait]
impl Connection for MemoryDb {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn table_exists(&self, table: &str) -> linked_rows::Result<bool> {
        Ok(self.tables.contains_key(&table.to_lowercase()))
    }

    async fn column_metadata(&self, table: &str) -> linked_rows::Result<Vec<ColumnMetadata>> {
        Ok(self.get(table)?.columns.clone())
    }

    async fn primary_keys(&self, table: &str) -> linked_rows::Result<Vec<String>> {
        Ok(self.get(table)?.pks.clone())
    }

    async fn exported_keys(&self, table: &str) -> linked_rows::Result<Vec<Fk>> {
        let key = table.to_lowercase();
        Ok(self
            .constraints
            .iter()
            .filter(|c| c.pk_table == key)
            .map(|c| to_fk(c, false))
            .collect())
    }

    async fn imported_keys(&self, table: &str) -> linked_rows::Result<Vec<Fk>> {
        let key = table.to_lowercase();
        Ok(self
            .constraints
            .iter()
            .filter(|c| c.fk_table == key)
            .map(|c| to_fk(c, true))
            .collect())
    }

    async fn select_eq(
        &self,
        table: &str,
        column: &str,
        value: &SqlValue,
    ) -> linked_rows::Result<Vec<RawRow>> {
        let wanted = value.clone().normalized().canonical_text();
        let rows = self
            .get(table)?
            .rows
            .iter()
            .filter(|row| {
                row.iter().any(|(name, cell)| {
                    name.eq_ignore_ascii_case(column)
                        && !cell.is_null()
                        && cell.clone().normalized().canonical_text() == wanted
                })
            })
            .cloned()
            .collect();
        Ok(rows)
    }
}

fn to_fk(c: &Constraint, inverted: bool) -> Fk {
    Fk {
        pk_table: c.pk_table.clone(),
        pk_column: c.pk_column.clone(),
        fk_table: c.fk_table.clone(),
        fk_column: c.fk_column.clone(),
        constraint_name: Some(c.name.clone()),
        inverted,
    }
}

/// The blog fixture most tests share: author 1 wrote blogpost 2, which has
/// three comments.
pub fn blog_db() -> MemoryDb {
    MemoryDb::new()
        .table("author", &[("id", "int4"), ("name", "varchar")], &["id"])
        .table(
            "blogpost",
            &[("id", "int4"), ("title", "varchar"), ("author_id", "int4")],
            &["id"],
        )
        .table(
            "comment",
            &[("id", "int4"), ("post_id", "int4"), ("body", "varchar")],
            &["id"],
        )
        .fk("blogpost", "author_id", "author", "id")
        .fk("comment", "post_id", "blogpost", "id")
        .row("author", &[("id", SqlValue::I32(1)), ("name", SqlValue::Text("ada".into()))])
        .row(
            "blogpost",
            &[
                ("id", SqlValue::I32(2)),
                ("title", SqlValue::Text("hello".into())),
                ("author_id", SqlValue::I32(1)),
            ],
        )
        .row(
            "comment",
            &[
                ("id", SqlValue::I32(10)),
                ("post_id", SqlValue::I32(2)),
                ("body", SqlValue::Text("first".into())),
            ],
        )
        .row(
            "comment",
            &[
                ("id", SqlValue::I32(11)),
                ("post_id", SqlValue::I32(2)),
                ("body", SqlValue::Text("second".into())),
            ],
        )
        .row(
            "comment",
            &[
                ("id", SqlValue::I32(12)),
                ("post_id", SqlValue::I32(2)),
                ("body", SqlValue::Text("third".into())),
            ],
        )
}
