//! End-to-end walker tests against the in-memory fixture.

mod common;

use common::{blog_db, MemoryDb};
use linked_rows::{json, ExportError, Exporter, RowLink, SqlValue, SUB_ROW_KEY};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

fn chain_db() -> MemoryDb {
    MemoryDb::new()
        .table("author", &[("id", "int4"), ("name", "varchar")], &["id"])
        .table(
            "blogpost",
            &[("id", "int4"), ("title", "varchar"), ("author_id", "int4")],
            &["id"],
        )
        .fk("blogpost", "author_id", "author", "id")
        .row("author", &[("id", SqlValue::I32(1)), ("name", SqlValue::Text("ada".into()))])
        .row(
            "blogpost",
            &[
                ("id", SqlValue::I32(2)),
                ("title", SqlValue::Text("hello".into())),
                ("author_id", SqlValue::I32(1)),
            ],
        )
}

fn cycle_db() -> MemoryDb {
    MemoryDb::new()
        .table("a", &[("id", "int4"), ("b_id", "int4")], &["id"])
        .table("b", &[("id", "int4"), ("a_id", "int4")], &["id"])
        .fk("a", "b_id", "b", "id")
        .fk("b", "a_id", "a", "id")
        .row("a", &[("id", SqlValue::I32(1)), ("b_id", SqlValue::I32(1))])
        .row("b", &[("id", SqlValue::I32(1)), ("a_id", SqlValue::I32(1))])
}

#[tokio::test]
async fn test_two_table_chain() {
    let db = chain_db();
    let record = Exporter::new().export(&db, "blogpost", "2").await.unwrap();

    let tree = json::to_json(&record);
    assert_eq!(tree["id"], 2);
    assert_eq!(tree["title"], "hello");
    assert_eq!(tree["author_id"], 1);

    let authors = &tree[SUB_ROW_KEY]["author"];
    assert_eq!(authors.as_array().unwrap().len(), 1);
    assert_eq!(authors[0]["name"], "ada");
}

#[tokio::test]
async fn test_sibling_fan_out() {
    let db = blog_db();
    let record = Exporter::new().export(&db, "blogpost", "2").await.unwrap();

    let tree = json::to_json(&record);
    let comments = tree[SUB_ROW_KEY]["comment"].as_array().unwrap();
    assert_eq!(comments.len(), 3);
    assert!(tree[SUB_ROW_KEY]["author"].as_array().is_some());
}

#[tokio::test]
async fn test_cycle_terminates_without_reinclusion() {
    let db = cycle_db();
    let record = Exporter::new().export(&db, "a", "1").await.unwrap();

    // a's subrows contain b once; b carries no subrows back to a.
    let b_rows = &record.find_cell("id").unwrap().sub_rows["b"];
    assert_eq!(b_rows.len(), 1);
    assert!(b_rows[0].cells.iter().all(|c| c.sub_rows.is_empty()));

    assert_eq!(record.count_records(), 2);
}

#[tokio::test]
async fn test_cycle_treated_fks_deduplicate_directions() {
    let db = cycle_db();
    let record = Exporter::new().export(&db, "a", "1").await.unwrap();

    // Two physical constraints, each observed from both sides.
    let ctx = record.export_context.as_ref().unwrap();
    assert_eq!(ctx.treated_fks.len(), 2);
}

#[tokio::test]
async fn test_stop_tables_excluded() {
    let db = blog_db();
    let record = Exporter::new()
        .with_stop_tables_excluded(["comment"])
        .export(&db, "blogpost", "2")
        .await
        .unwrap();

    let tree = json::to_json(&record);
    assert!(tree[SUB_ROW_KEY].get("comment").is_none());
    assert!(tree[SUB_ROW_KEY].get("author").is_some());
}

#[tokio::test]
async fn test_stop_tables_included_narrow() {
    let db = blog_db();
    let record = Exporter::new()
        .with_stop_tables_included(["author"])
        .export(&db, "blogpost", "2")
        .await
        .unwrap();

    let tree = json::to_json(&record);
    assert!(tree[SUB_ROW_KEY].get("comment").is_none());
    assert_eq!(tree[SUB_ROW_KEY]["author"].as_array().unwrap().len(), 1);

    // author's back-edge to blogpost is outside the allow-list too.
    assert_eq!(record.count_records(), 2);
}

#[tokio::test]
async fn test_stop_table_monotonicity() {
    let db = blog_db();
    let full = Exporter::new().export(&db, "blogpost", "2").await.unwrap();
    let restricted = Exporter::new()
        .with_stop_tables_excluded(["comment"])
        .export(&db, "blogpost", "2")
        .await
        .unwrap();

    let full_visited = &full.export_context.as_ref().unwrap().visited;
    let restricted_visited = &restricted.export_context.as_ref().unwrap().visited;
    assert!(restricted_visited.is_subset(full_visited));
}

#[tokio::test]
async fn test_visited_matches_distinct_row_links_in_tree() {
    let db = blog_db();
    let record = Exporter::new().export(&db, "blogpost", "2").await.unwrap();

    let mut in_tree: HashSet<RowLink> = HashSet::new();
    record.visit(&mut |r| {
        in_tree.insert(r.row_link.clone());
    });

    let ctx = record.export_context.as_ref().unwrap();
    assert_eq!(ctx.visited, in_tree);
}

#[tokio::test]
async fn test_closure_invariant() {
    let db = blog_db();
    let record = Exporter::new().export(&db, "blogpost", "2").await.unwrap();
    let ctx = record.export_context.as_ref().unwrap();

    // Every non-NULL fk cell either carries the referenced row in its
    // subrows or the referenced row was visited elsewhere.
    let fk_columns = [("author_id", "author"), ("post_id", "blogpost")];
    record.visit(&mut |r| {
        for cell in &r.cells {
            for (column, referenced_table) in &fk_columns {
                if cell.name == *column && !cell.value.is_null() {
                    let attached = cell
                        .sub_rows
                        .get(*referenced_table)
                        .map(|rows| !rows.is_empty())
                        .unwrap_or(false);
                    let visited_elsewhere = ctx
                        .visited
                        .contains(&RowLink::new(referenced_table, cell.value.clone()));
                    assert!(
                        attached || visited_elsewhere,
                        "unresolved fk {}={} on {}",
                        column,
                        cell.value.canonical_text(),
                        r.row_link
                    );
                }
            }
        }
    });
}

#[tokio::test]
async fn test_case_insensitive_root_table() {
    let db = blog_db();
    let upper = Exporter::new().export(&db, "BLOGPOST", "2").await.unwrap();
    let lower = Exporter::new().export(&db, "blogpost", "2").await.unwrap();
    assert_eq!(json::to_json(&upper), json::to_json(&lower));
}

#[tokio::test]
async fn test_dangling_fk_yields_empty_sub_row_list() {
    let db = MemoryDb::new()
        .table("author", &[("id", "int4"), ("name", "varchar")], &["id"])
        .table(
            "blogpost",
            &[("id", "int4"), ("author_id", "int4")],
            &["id"],
        )
        .fk("blogpost", "author_id", "author", "id")
        .row(
            "blogpost",
            &[("id", SqlValue::I32(2)), ("author_id", SqlValue::I32(99))],
        );

    let record = Exporter::new().export(&db, "blogpost", "2").await.unwrap();
    let authors = &record.find_cell("author_id").unwrap().sub_rows["author"];
    assert!(authors.is_empty());
}

#[tokio::test]
async fn test_null_fk_is_not_traversed() {
    let db = MemoryDb::new()
        .table("author", &[("id", "int4"), ("name", "varchar")], &["id"])
        .table(
            "blogpost",
            &[("id", "int4"), ("author_id", "int4")],
            &["id"],
        )
        .fk("blogpost", "author_id", "author", "id")
        .row(
            "blogpost",
            &[
                ("id", SqlValue::I32(2)),
                ("author_id", SqlValue::Null(linked_rows::SqlNullType::I32)),
            ],
        );

    let record = Exporter::new().export(&db, "blogpost", "2").await.unwrap();
    assert!(record.find_cell("author_id").unwrap().sub_rows.is_empty());
}

#[tokio::test]
async fn test_unknown_table_fails() {
    let db = blog_db();
    let err = Exporter::new().export(&db, "nope", "1").await.unwrap_err();
    assert!(matches!(err, ExportError::TableNotFound(t) if t == "nope"));
}

#[tokio::test]
async fn test_table_without_pk_fails() {
    let db = MemoryDb::new().table("audit_log", &[("entry", "varchar")], &[]);
    let err = Exporter::new()
        .export(&db, "audit_log", "x")
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::PrimaryKeyMissing(_)));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();

    let db = blog_db();
    let err = Exporter::new()
        .with_cancellation(token)
        .export(&db, "blogpost", "2")
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Cancelled));
}

#[tokio::test]
async fn test_shared_cache_across_exports() {
    let db = blog_db();
    let cache = std::sync::Arc::new(linked_rows::MetadataCache::new());

    let first = Exporter::new()
        .with_cache(cache.clone())
        .export(&db, "blogpost", "2")
        .await
        .unwrap();
    assert!(cache.fks.len() > 0);

    let second = Exporter::new()
        .with_cache(cache)
        .export(&db, "blogpost", "2")
        .await
        .unwrap();
    assert_eq!(json::to_json(&first), json::to_json(&second));
}
