//! The exported record tree and row identity.

use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};

use crate::core::schema::{ColumnMetadata, Fk};
use crate::core::value::SqlValue;

/// A table plus a normalized primary-key value: uniquely identifies a db row.
///
/// The pk is normalized on construction (integral widths collapse to 64-bit),
/// and identity is the canonical string form, so `(t, 7_i32)` and `(t, 7_i64)`
/// hash equal and survive serialization round trips.
#[derive(Debug, Clone)]
pub struct RowLink {
    /// Table name, lowercased.
    pub table: String,

    /// Normalized primary-key value.
    pub pk: SqlValue,
}

impl RowLink {
    pub fn new(table: &str, pk: SqlValue) -> Self {
        RowLink {
            table: table.to_lowercase(),
            pk: pk.normalized(),
        }
    }

    /// Parse the short form `"table/pk"`.
    ///
    /// An integer-shaped tail becomes an integer pk, anything else stays
    /// textual.
    pub fn parse(short_expression: &str) -> Option<Self> {
        let idx = short_expression.find('/')?;
        let (table, rest) = short_expression.split_at(idx);
        let rest = &rest[1..];

        let pk = match rest.parse::<i64>() {
            Ok(n) => SqlValue::I64(n),
            Err(_) => SqlValue::Text(rest.to_string()),
        };
        Some(RowLink::new(table, pk))
    }
}

impl std::fmt::Display for RowLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.table, self.pk.canonical_text())
    }
}

impl PartialEq for RowLink {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table && self.pk.canonical_text() == other.pk.canonical_text()
    }
}

impl Eq for RowLink {}

impl Hash for RowLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table.hash(state);
        self.pk.canonical_text().hash(state);
    }
}

/// One column of an exported row.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Column name, lowercased.
    pub name: String,

    /// The driver's native value.
    pub value: SqlValue,

    /// Column metadata, looked up case-insensitively in the table's catalog
    /// entry. Absent when the catalog did not report the result column.
    pub metadata: Option<ColumnMetadata>,

    /// Child rows attached by the walker, keyed by child table name. Only
    /// populated on cells whose column drove a traversed FK edge.
    pub sub_rows: BTreeMap<String, Vec<Record>>,
}

impl Cell {
    pub fn new(name: &str, value: SqlValue, metadata: Option<ColumnMetadata>) -> Self {
        Cell {
            name: name.to_lowercase(),
            value,
            metadata,
            sub_rows: BTreeMap::new(),
        }
    }

    /// Whether this cell drove at least one traversal.
    pub fn has_sub_rows(&self) -> bool {
        !self.sub_rows.is_empty()
    }
}

/// One exported row: an ordered list of cells plus its identity.
#[derive(Debug, Clone)]
pub struct Record {
    /// Owning table, lowercased.
    pub table: String,

    /// Identity of this row.
    pub row_link: RowLink,

    /// Cells in result-set order.
    pub cells: Vec<Cell>,

    /// Traversal context; attached to the root record only.
    pub export_context: Option<Box<ExportContext>>,
}

impl Record {
    pub fn new(table: &str, pk: SqlValue) -> Self {
        let table = table.to_lowercase();
        Record {
            row_link: RowLink::new(&table, pk),
            table,
            cells: Vec::new(),
            export_context: None,
        }
    }

    /// Re-key this record after its pk cell value is known.
    pub fn set_pk_value(&mut self, pk: SqlValue) {
        self.row_link = RowLink::new(&self.table, pk);
    }

    /// Find a cell by column name, case-insensitively.
    pub fn find_cell(&self, column_name: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column_name))
    }

    /// Mutable variant of [`find_cell`](Record::find_cell).
    pub fn find_cell_mut(&mut self, column_name: &str) -> Option<&mut Cell> {
        self.cells
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(column_name))
    }

    /// All records of the tree rooted here, depth-first, self included.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a Record)) {
        f(self);
        for cell in &self.cells {
            for records in cell.sub_rows.values() {
                for record in records {
                    record.visit(f);
                }
            }
        }
    }

    /// Mutable depth-first visit, self included.
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Record)) {
        f(self);
        for cell in &mut self.cells {
            for records in cell.sub_rows.values_mut() {
                for record in records {
                    record.visit_mut(f);
                }
            }
        }
    }

    /// Count of records in the tree rooted here, self included.
    pub fn count_records(&self) -> usize {
        let mut n = 0;
        self.visit(&mut |_| n += 1);
        n
    }
}

/// Per-export traversal context: what was visited and which edges were seen.
///
/// Owned by one export call and attached to the root record afterwards. The
/// visited set is keyed by normalized [`RowLink`], which is what terminates
/// cyclic row graphs.
#[derive(Debug, Clone, Default)]
pub struct ExportContext {
    /// Every row read during the export, at most one entry per row.
    pub visited: HashSet<RowLink>,

    /// Every FK edge the walker considered; diagnostic, append-only.
    pub treated_fks: HashSet<Fk>,
}

impl ExportContext {
    pub fn contains_node(&self, table: &str, pk: &SqlValue) -> bool {
        self.visited
            .contains(&RowLink::new(table, pk.clone()))
    }
}
