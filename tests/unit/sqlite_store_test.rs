//! Unit tests for the SQLite document store: owner queries, batch commits,
//! server timestamps, version preconditions, and rollback.

use serde_json::{json, Map, Value};

use bookmark_admin::managers::bookmark_manager::{BookmarkManager, BookmarkManagerTrait};
use bookmark_admin::store::sqlite::SqliteDocumentStore;
use bookmark_admin::store::DocumentStore;
use bookmark_admin::types::document::{OwnerQuery, StagedUpdate, WriteBatch};
use bookmark_admin::types::errors::StoreError;

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

fn owner_query(owner: &str) -> OwnerQuery {
    OwnerQuery {
        collection: "bookmarks".to_string(),
        owner_field: "userId".to_string(),
        owner: owner.to_string(),
        order_by: "createdAt".to_string(),
    }
}

fn seeded() -> SqliteDocumentStore {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    store
        .put_document("bookmarks", "b2", &fields(json!({"userId": "u1", "createdAt": "2024-01-02T00:00:00.000Z"})))
        .unwrap();
    store
        .put_document("bookmarks", "b1", &fields(json!({"userId": "u1", "createdAt": "2024-01-01T00:00:00.000Z", "order": 4})))
        .unwrap();
    store
        .put_document("bookmarks", "b3", &fields(json!({"userId": "u2", "createdAt": "2024-01-03T00:00:00.000Z"})))
        .unwrap();
    store
}

#[tokio::test]
async fn test_query_filters_by_owner_and_sorts_ascending() {
    let store = seeded();

    let docs = store.query_by_owner(&owner_query("u1")).await.unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["b1", "b2"]);
    assert!(docs.iter().all(|d| d.version.is_some()));
    assert_eq!(docs[0].get("order"), Some(&json!(4)));
}

#[tokio::test]
async fn test_query_excludes_documents_without_sort_field() {
    let store = seeded();
    store
        .put_document("bookmarks", "b4", &fields(json!({"userId": "u1"})))
        .unwrap();

    let docs = store.query_by_owner(&owner_query("u1")).await.unwrap();
    assert_eq!(docs.len(), 2);
}

#[tokio::test]
async fn test_commit_merges_fields_and_stamps_server_time() {
    let store = seeded();
    let before = store
        .put_document(
            "bookmarks",
            "b5",
            &fields(json!({"userId": "u1", "createdAt": "2024-01-05T00:00:00.000Z", "title": "keep me"})),
        )
        .unwrap();

    let mut batch = WriteBatch::new("bookmarks");
    batch.stage(
        StagedUpdate::new("b5")
            .set_field("order", json!(3))
            .server_timestamp("updatedAt"),
    );
    let outcome = store.commit(batch).await.unwrap();
    assert_eq!(outcome.applied, vec!["b5".to_string()]);
    assert!(outcome.skipped.is_empty());

    let doc = store.get_document("bookmarks", "b5").unwrap().unwrap();
    assert_eq!(doc.get("order"), Some(&json!(3)));
    assert_eq!(doc.get("title"), Some(&json!("keep me")));
    let stamp = doc.get("updatedAt").and_then(Value::as_str).unwrap();
    assert!(bookmark_admin::types::bookmark::timestamp::parse(stamp).is_ok());
    let after = doc.version.unwrap();
    assert_ne!(after, before);
    assert!(after.as_str().parse::<i64>().unwrap() > before.as_str().parse::<i64>().unwrap());
}

#[tokio::test]
async fn test_commit_is_atomic_when_a_document_is_missing() {
    let store = seeded();

    let mut batch = WriteBatch::new("bookmarks");
    batch.stage(StagedUpdate::new("b2").set_field("order", json!(2)));
    batch.stage(StagedUpdate::new("ghost").set_field("order", json!(9)));

    let err = store.commit(batch).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    let b2 = store.get_document("bookmarks", "b2").unwrap().unwrap();
    assert!(b2.get("order").is_none(), "first write must be rolled back");
}

#[tokio::test]
async fn test_stale_precondition_skips_only_that_document() {
    let store = seeded();
    let docs = store.query_by_owner(&owner_query("u1")).await.unwrap();
    let b1_version = docs[0].version.clone();
    let b2_version = docs[1].version.clone();

    // b2 changes after it was read.
    store
        .put_document("bookmarks", "b2", &fields(json!({"userId": "u1", "createdAt": "2024-01-02T00:00:00.000Z", "order": 10})))
        .unwrap();

    let mut batch = WriteBatch::new("bookmarks");
    batch.stage(StagedUpdate::new("b1").set_field("title", json!("t")).precondition(b1_version));
    batch.stage(StagedUpdate::new("b2").set_field("order", json!(2)).precondition(b2_version));
    batch.stage(StagedUpdate::new("gone").set_field("order", json!(3)).precondition(Some(
        bookmark_admin::types::document::DocumentVersion::new("1"),
    )));

    let outcome = store.commit(batch).await.unwrap();
    assert_eq!(outcome.applied, vec!["b1".to_string()]);
    assert_eq!(outcome.skipped, vec!["b2".to_string(), "gone".to_string()]);

    let b2 = store.get_document("bookmarks", "b2").unwrap().unwrap();
    assert_eq!(b2.get("order"), Some(&json!(10)));
}

#[tokio::test]
async fn test_query_sorts_timestamps_by_instant() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    for (id, created) in [
        ("a", "2024-01-01T00:00:00Z"),
        ("b", "2024-01-01T00:00:00.500Z"),
        ("c", "2024-01-01T01:00:00+02:00"),
        ("d", "2024-01-01T00:00:00.000Z"),
    ] {
        store
            .put_document("bookmarks", id, &fields(json!({"userId": "u1", "createdAt": created})))
            .unwrap();
    }

    let docs = store.query_by_owner(&owner_query("u1")).await.unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    // a and d are the same instant and keep insertion order.
    assert_eq!(ids, vec!["c", "a", "d", "b"]);
}

#[test]
fn test_compare_values_ranks_types() {
    use bookmark_admin::store::sqlite::compare_values;
    use std::cmp::Ordering;

    assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
    assert_eq!(compare_values(&json!(10), &json!("2024-01-01T00:00:00Z")), Ordering::Less);
    assert_eq!(compare_values(&json!("2024-01-01T00:00:00Z"), &json!("apple")), Ordering::Less);
    assert_eq!(compare_values(&json!("apple"), &json!("banana")), Ordering::Less);
    assert_eq!(
        compare_values(&json!("2024-01-01T02:00:00+02:00"), &json!("2024-01-01T00:00:00.000Z")),
        Ordering::Equal
    );
}

#[tokio::test]
async fn test_guarded_write_skips_deleted_and_recreated_document() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let body = json!({"userId": "u1", "url": "https://a.example", "title": "A", "createdAt": "2024-01-01T00:00:00.000Z"});
    store.put_document("bookmarks", "a", &fields(body.clone())).unwrap();
    let docs = store.query_by_owner(&owner_query("u1")).await.unwrap();
    let stale = docs[0].version.clone();

    {
        let db = store.lock().unwrap();
        let mut mgr = BookmarkManager::new(db.connection());
        mgr.remove_bookmark("a").unwrap();
    }
    let mut recreated = body;
    recreated["order"] = json!(7);
    store.put_document("bookmarks", "a", &fields(recreated)).unwrap();

    let mut batch = WriteBatch::new("bookmarks");
    batch.stage(StagedUpdate::new("a").set_field("order", json!(1)).precondition(stale));
    let outcome = store.commit(batch).await.unwrap();

    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.skipped, vec!["a".to_string()]);
    let doc = store.get_document("bookmarks", "a").unwrap().unwrap();
    assert_eq!(doc.get("order"), Some(&json!(7)));
}

#[tokio::test]
async fn test_commit_rejects_oversized_batch() {
    let store = seeded();
    let mut batch = WriteBatch::new("bookmarks");
    for i in 0..501 {
        batch.stage(StagedUpdate::new(format!("d{}", i)).set_field("order", json!(i)));
    }

    let err = store.commit(batch).await.unwrap_err();
    assert!(matches!(err, StoreError::BatchTooLarge { size: 501, limit: 500 }));
}

#[test]
fn test_json_path_quotes_unusual_field_names() {
    use bookmark_admin::store::sqlite::json_path;
    assert_eq!(json_path("createdAt"), "$.createdAt");
    assert_eq!(json_path("created-at"), "$.\"created-at\"");
}
