//! Insertion-order tests against the in-memory fixture.

mod common;

use common::{blog_db, MemoryDb};
use linked_rows::{determine_insertion_order, ExportError, SqlValue};

#[tokio::test]
async fn test_blog_schema_orders_parents_first() {
    let db = blog_db();
    let order = determine_insertion_order(&db, "blogpost", true).await.unwrap();
    assert_eq!(order, vec!["author", "blogpost", "comment"]);
}

#[tokio::test]
async fn test_order_is_case_insensitive_on_root() {
    let db = blog_db();
    let upper = determine_insertion_order(&db, "BLOGPOST", true).await.unwrap();
    let lower = determine_insertion_order(&db, "blogpost", true).await.unwrap();
    assert_eq!(upper, lower);
}

#[tokio::test]
async fn test_unreachable_tables_are_not_listed() {
    let db = blog_db().table("unrelated", &[("id", "int4")], &["id"]);
    let order = determine_insertion_order(&db, "blogpost", true).await.unwrap();
    assert!(!order.contains(&"unrelated".to_string()));
}

#[tokio::test]
async fn test_cycle_strict_mode_fails() {
    let db = MemoryDb::new()
        .table("a", &[("id", "int4"), ("b_id", "int4")], &["id"])
        .table("b", &[("id", "int4"), ("a_id", "int4")], &["id"])
        .fk("a", "b_id", "b", "id")
        .fk("b", "a_id", "a", "id");

    let err = determine_insertion_order(&db, "a", true).await.unwrap_err();
    assert!(matches!(err, ExportError::CyclicDependencies(_)));
}

#[tokio::test]
async fn test_cycle_permissive_mode_returns_partial_list() {
    let db = MemoryDb::new()
        .table("a", &[("id", "int4"), ("b_id", "int4")], &["id"])
        .table("b", &[("id", "int4"), ("a_id", "int4")], &["id"])
        .table("c", &[("id", "int4"), ("a_id", "int4")], &["id"])
        .fk("a", "b_id", "b", "id")
        .fk("b", "a_id", "a", "id")
        .fk("c", "a_id", "a", "id");

    // a and b are cyclic; only the acyclic part can be layered, and c still
    // depends on a, so nothing else qualifies either.
    let order = determine_insertion_order(&db, "a", false).await.unwrap();
    assert!(order.is_empty());
}

#[tokio::test]
async fn test_self_reference_does_not_count_as_cycle() {
    let db = MemoryDb::new()
        .table(
            "employee",
            &[("id", "int4"), ("manager_id", "int4")],
            &["id"],
        )
        .fk("employee", "manager_id", "employee", "id")
        .row(
            "employee",
            &[("id", SqlValue::I32(1)), ("manager_id", SqlValue::I32(1))],
        );

    let order = determine_insertion_order(&db, "employee", true).await.unwrap();
    assert_eq!(order, vec!["employee"]);
}
