//! Tests for the importer-facing helpers against the in-memory fixture.

mod common;

use common::{blog_db, MemoryDb};
use linked_rows::{helpers, MetadataCache, SqlValue};

#[tokio::test]
async fn test_row_exists_single_pk() {
    let db = blog_db();
    let cache = MetadataCache::new();

    assert!(helpers::row_exists(&db, &cache, "blogpost", &["2".into()])
        .await
        .unwrap());
    assert!(!helpers::row_exists(&db, &cache, "blogpost", &["99".into()])
        .await
        .unwrap());
}

#[tokio::test]
async fn test_row_exists_composite_pk() {
    let db = MemoryDb::new()
        .table(
            "tag",
            &[("post_id", "int4"), ("name", "varchar")],
            &["post_id", "name"],
        )
        .row(
            "tag",
            &[("post_id", SqlValue::I32(2)), ("name", SqlValue::Text("rust".into()))],
        )
        .row(
            "tag",
            &[("post_id", SqlValue::I32(2)), ("name", SqlValue::Text("sql".into()))],
        );

    let cache = MetadataCache::new();
    assert!(
        helpers::row_exists(&db, &cache, "tag", &["2".into(), "rust".into()])
            .await
            .unwrap()
    );
    assert!(
        !helpers::row_exists(&db, &cache, "tag", &["2".into(), "python".into()])
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_row_exists_rejects_wrong_arity() {
    let db = blog_db();
    let cache = MetadataCache::new();
    assert!(
        helpers::row_exists(&db, &cache, "blogpost", &["2".into(), "extra".into()])
            .await
            .is_err()
    );
}
