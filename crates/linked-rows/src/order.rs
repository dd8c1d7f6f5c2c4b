//! Insertion-order computation for importers.
//!
//! If one wanted to re-insert the exported tree starting at the root table,
//! referenced (parent) tables must be inserted before their referencing
//! (child) tables. This walks the FK graph reachable from the root and peels
//! off dependency layers Kahn-style.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::warn;

use crate::cache::MetadataCache;
use crate::driver::Connection;
use crate::error::{ExportError, Result};
use crate::probe;

/// Dependency map: table -> tables it depends on (must be inserted after).
pub type DependencyGraph = HashMap<String, HashSet<String>>;

/// Compute the table insertion order for the FK graph reachable from
/// `root_table`. Table names are compared case-insensitively and returned
/// lowercased; each dependency layer is emitted in sorted order.
///
/// On a cycle the result is a partial list (with a warning), or
/// [`ExportError::CyclicDependencies`] when `fail_on_cycles` is set.
pub async fn determine_insertion_order(
    conn: &dyn Connection,
    root_table: &str,
    fail_on_cycles: bool,
) -> Result<Vec<String>> {
    determine_insertion_order_cached(conn, &MetadataCache::new(), root_table, fail_on_cycles).await
}

/// [`determine_insertion_order`] against shared metadata caches.
pub async fn determine_insertion_order_cached(
    conn: &dyn Connection,
    cache: &MetadataCache,
    root_table: &str,
    fail_on_cycles: bool,
) -> Result<Vec<String>> {
    let mut reached = HashSet::new();
    let graph = dependency_graph(conn, cache, root_table, &mut reached).await?;
    peel_order(reached, graph, fail_on_cycles)
}

/// BFS over FK edges from the root, collecting "X must precede Y"
/// constraints: `graph[y]` is the set of tables `y` depends on.
async fn dependency_graph(
    conn: &dyn Connection,
    cache: &MetadataCache,
    root_table: &str,
    reached: &mut HashSet<String>,
) -> Result<DependencyGraph> {
    let mut to_treat = BTreeSet::new();
    to_treat.insert(root_table.to_lowercase());

    let mut graph: DependencyGraph = HashMap::new();

    while let Some(next) = to_treat.pop_first() {
        if reached.contains(&next) {
            continue;
        }
        let fks = probe::foreign_keys_of(conn, cache, &next).await?;
        for fk in fks {
            let parent = fk.pk_table.to_lowercase();
            let child = fk.fk_table.to_lowercase();

            if !reached.contains(&parent) {
                to_treat.insert(parent.clone());
            }
            if !reached.contains(&child) {
                to_treat.insert(child.clone());
            }

            // Self-references impose no layering.
            if parent != child {
                graph.entry(child).or_default().insert(parent);
            }
        }
        reached.insert(next);
    }

    Ok(graph)
}

/// Repeatedly peel off tables with no remaining prerequisites.
fn peel_order(
    reached: HashSet<String>,
    mut graph: DependencyGraph,
    fail_on_cycles: bool,
) -> Result<Vec<String>> {
    let mut ordered = Vec::with_capacity(reached.len());
    let mut still_to_treat = reached;

    while !still_to_treat.is_empty() {
        let mut layer: Vec<String> = still_to_treat
            .iter()
            .filter(|t| !graph.contains_key(*t))
            .cloned()
            .collect();

        if layer.is_empty() {
            warn!(
                "Not a layered organization of table dependencies - excluding connected tables: {:?}",
                graph
            );
            if fail_on_cycles {
                let mut remaining: Vec<&String> = graph.keys().collect();
                remaining.sort();
                return Err(ExportError::CyclicDependencies(format!("{:?}", remaining)));
            }
            break; // partial list
        }

        layer.sort();
        for t in &layer {
            still_to_treat.remove(t);
        }

        for deps in graph.values_mut() {
            for t in &layer {
                deps.remove(t);
            }
        }
        graph.retain(|_, deps| !deps.is_empty());

        ordered.extend(layer);
    }

    Ok(ordered)
}
