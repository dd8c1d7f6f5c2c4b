//! Canonicalization: content-derived surrogate primary keys.
//!
//! Two exports of semantically equivalent data usually differ only in their
//! surrogate id sequences. This pass renumbers the surrogate PKs of every
//! table in the tree (single numeric PK only) to the 1-based rank of each
//! row's content hash, rewrites every FK cell that references a renumbered
//! row, and reorders sub-row lists by content hash - after which equivalent
//! trees serialize byte-identically.
//!
//! The content hash covers the non-surrogate payload of a row plus,
//! recursively, the hashes of its attached sub-rows. Surrogate cells (the PK
//! itself and FK references into renumbered tables) are excluded, which is
//! what makes the pass a fixed point: running it twice yields the same tree.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::cache::MetadataCache;
use crate::core::{Record, RowLink, SqlTypeCode, SqlValue};
use crate::driver::Connection;
use crate::error::Result;
use crate::probe::{self, find_column};

type Hash = [u8; 32];

/// Renumber surrogate primary keys in `record`'s tree to content-derived
/// values, updating all FK references transitively.
///
/// Tables whose PK is composite or non-numeric are left unchanged. The fk and
/// pk caches are consulted first, so a tree produced by an [`Exporter`] that
/// shared its cache needs no reprobing.
///
/// [`Exporter`]: crate::Exporter
pub async fn canonicalize_ids(
    conn: &dyn Connection,
    record: &mut Record,
    cache: &MetadataCache,
) -> Result<()> {
    let mut tables = BTreeSet::new();
    record.visit(&mut |r| {
        tables.insert(r.table.clone());
    });

    // Per-table schema facts: the single numeric pk column of renumberable
    // tables, and which (table, column) pairs reference which table.
    let mut pk_col: HashMap<String, String> = HashMap::new();
    let mut fk_ref: HashMap<(String, String), String> = HashMap::new();

    for table in &tables {
        let pks = probe::primary_keys(conn, cache, table).await?;
        if let [single] = pks.as_slice() {
            let columns = probe::column_metadata(conn, cache, table).await?;
            let numeric = find_column(&columns, single)
                .map(|c| c.type_code == SqlTypeCode::Int)
                .unwrap_or(false);
            if numeric {
                pk_col.insert(table.clone(), single.to_lowercase());
            }
        }

        for fk in probe::foreign_keys_of(conn, cache, table).await? {
            if fk.fk_table == *table {
                fk_ref.insert((table.clone(), fk.fk_column.clone()), fk.pk_table.clone());
            }
        }
    }

    // Cells excluded from hashing: pk cells of renumberable tables and fk
    // cells pointing into them.
    let mut surrogate: HashMap<String, HashSet<String>> = HashMap::new();
    for (table, pk) in &pk_col {
        surrogate.entry(table.clone()).or_default().insert(pk.clone());
    }
    for ((table, column), referenced) in &fk_ref {
        if pk_col.contains_key(referenced) {
            surrogate
                .entry(table.clone())
                .or_default()
                .insert(column.clone());
        }
    }

    // Hash every row (reordering sub-row lists on the way); a row attached at
    // several places contributes every occurrence.
    let mut occurrences: HashMap<RowLink, Vec<Hash>> = HashMap::new();
    hash_record(record, &surrogate, &mut occurrences);

    // Renumber per table: rows ranked by folded hash, ties broken by the old
    // pk (ties are content-identical rows, so either order serializes the
    // same).
    let mut by_table: BTreeMap<String, Vec<(Hash, i64)>> = BTreeMap::new();
    for (link, mut hashes) in occurrences {
        if !pk_col.contains_key(&link.table) {
            continue;
        }
        let Some(old_pk) = link.pk.as_i64() else {
            continue;
        };
        hashes.sort_unstable();
        let mut hasher = Sha256::new();
        for h in &hashes {
            hasher.update(h);
        }
        by_table
            .entry(link.table)
            .or_default()
            .push((hasher.finalize().into(), old_pk));
    }

    let mut remap: HashMap<(String, i64), i64> = HashMap::new();
    for (table, mut rows) in by_table {
        rows.sort_unstable();
        for (rank, (_, old_pk)) in rows.into_iter().enumerate() {
            remap.insert((table.clone(), old_pk), rank as i64 + 1);
        }
    }
    debug!("Canonicalizing {} surrogate keys", remap.len());

    rewrite(record, &pk_col, &fk_ref, &remap);
    Ok(())
}

/// Post-order content hash; sorts each sub-row list by (hash, old row link).
fn hash_record(
    record: &mut Record,
    surrogate: &HashMap<String, HashSet<String>>,
    occurrences: &mut HashMap<RowLink, Vec<Hash>>,
) -> Hash {
    let surrogates = surrogate.get(&record.table);

    let mut hasher = Sha256::new();
    hasher.update(record.table.as_bytes());
    hasher.update([0xff]);

    for cell in &mut record.cells {
        hasher.update(cell.name.as_bytes());
        hasher.update([0xfe]);

        let is_surrogate = surrogates.map_or(false, |s| s.contains(&cell.name));
        if !is_surrogate {
            hasher.update(cell.value.canonical_text().as_bytes());
        }
        hasher.update([0xfd]);

        for (child_table, rows) in &mut cell.sub_rows {
            let mut hashed: Vec<(Hash, String, Record)> = rows
                .drain(..)
                .map(|mut row| {
                    let h = hash_record(&mut row, surrogate, occurrences);
                    (h, row.row_link.to_string(), row)
                })
                .collect();
            hashed.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

            hasher.update(child_table.as_bytes());
            hasher.update([0xfc]);
            for (h, _, row) in hashed {
                hasher.update(h);
                rows.push(row);
            }
        }
    }

    let hash: Hash = hasher.finalize().into();
    occurrences
        .entry(record.row_link.clone())
        .or_default()
        .push(hash);
    hash
}

/// Apply the remap to every pk cell, fk cell, and row link in the tree.
fn rewrite(
    record: &mut Record,
    pk_col: &HashMap<String, String>,
    fk_ref: &HashMap<(String, String), String>,
    remap: &HashMap<(String, i64), i64>,
) {
    record.visit_mut(&mut |r| {
        let table = r.table.clone();
        let pk_name = pk_col.get(&table);

        for cell in &mut r.cells {
            let target_table = if pk_name == Some(&cell.name) {
                Some(&table)
            } else {
                fk_ref
                    .get(&(table.clone(), cell.name.clone()))
                    .filter(|t| pk_col.contains_key(*t))
            };

            if let (Some(target), Some(old)) = (target_table, cell.value.as_i64()) {
                if let Some(new) = remap.get(&(target.clone(), old)) {
                    cell.value = SqlValue::I64(*new);
                }
            }
        }

        if pk_name.is_some() {
            if let Some(old) = r.row_link.pk.as_i64() {
                if let Some(new) = remap.get(&(table.clone(), old)) {
                    r.row_link = RowLink::new(&table, SqlValue::I64(*new));
                }
            }
        }
    });
}
