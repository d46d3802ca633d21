//! Unit tests for the RPC handler: every JSON-RPC method dispatched by `handle_method`.
//!
//! These tests go through the same code path as the `bookmark-admin-rpc`
//! binary, using a temporary on-disk SQLite database.

use serde_json::json;
use tempfile::TempDir;

use bookmark_admin::app::App;
use bookmark_admin::rpc_handler::handle_method;
use bookmark_admin::types::settings::AdminSettings;

/// Create a fresh App backed by a temp directory DB.
fn setup() -> (App, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let mut settings = AdminSettings::default();
    settings.store.sqlite_path = Some(tmp.path().join("data").join("test.db").to_string_lossy().to_string());
    let app = App::new(settings).expect("Failed to init App");
    (app, tmp)
}

async fn add(app: &App, user: &str, created_at: &str, order: Option<i64>) -> String {
    let mut params = json!({
        "user_id": user,
        "url": "https://example.com",
        "title": "Example",
        "created_at": created_at,
    });
    if let Some(order) = order {
        params["order"] = json!(order);
    }
    let res = handle_method(app, "bookmark.add", &params).await.unwrap();
    res["id"].as_str().unwrap().to_string()
}

// ─── Ping ───

#[tokio::test]
async fn test_ping() {
    let (app, _tmp) = setup();
    let res = handle_method(&app, "ping", &json!({})).await.unwrap();
    assert_eq!(res, json!({"pong": true}));
}

// ─── Unknown method ───

#[tokio::test]
async fn test_unknown_method_returns_error() {
    let (app, _tmp) = setup();
    let res = handle_method(&app, "nonexistent.method", &json!({})).await;
    assert!(res.unwrap_err().contains("unknown method"));
}

// ─── Bookmarks ───

#[tokio::test]
async fn test_bookmark_add_and_list() {
    let (app, _tmp) = setup();
    let second = add(&app, "u1", "2024-01-02T00:00:00Z", None).await;
    let first = add(&app, "u1", "2024-01-01T00:00:00Z", Some(0)).await;
    add(&app, "u2", "2024-01-01T00:00:00Z", None).await;

    let list = handle_method(&app, "bookmark.list", &json!({"user_id": "u1"}))
        .await
        .unwrap();
    let items = list["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], first.as_str());
    assert_eq!(items[0]["fields"]["order"], 0);
    assert_eq!(items[1]["id"], second.as_str());
    assert_eq!(items[1]["version"], "1");
}

#[tokio::test]
async fn test_bookmark_add_validates_params() {
    let (app, _tmp) = setup();
    let err = handle_method(&app, "bookmark.add", &json!({"user_id": "u1", "title": "x"}))
        .await
        .unwrap_err();
    assert!(err.contains("missing url"));

    let err = handle_method(
        &app,
        "bookmark.add",
        &json!({"user_id": "u1", "url": "ftp://example.com", "title": "x"}),
    )
    .await
    .unwrap_err();
    assert!(err.contains("Invalid bookmark URL"));

    let err = handle_method(
        &app,
        "bookmark.add",
        &json!({"user_id": "u1", "url": "https://example.com", "title": "x", "created_at": "yesterday"}),
    )
    .await
    .unwrap_err();
    assert!(err.contains("invalid created_at"));
}

// ─── Order backfill ───

#[tokio::test]
async fn test_order_preview_then_backfill() {
    let (app, _tmp) = setup();
    let a = add(&app, "u1", "2024-01-01T00:00:00Z", None).await;
    let b = add(&app, "u1", "2024-01-02T00:00:00Z", None).await;
    let c = add(&app, "u1", "2024-01-03T00:00:00Z", None).await;

    let preview = handle_method(&app, "order.preview", &json!({"user_id": "u1"}))
        .await
        .unwrap();
    assert_eq!(preview["dry_run"], true);
    assert_eq!(preview["planned"], 3);
    assert_eq!(preview["updated"], 0);
    assert_eq!(
        preview["assignments"],
        json!([{"id": a, "order": 1}, {"id": b, "order": 2}, {"id": c, "order": 3}])
    );

    let report = handle_method(&app, "order.backfill", &json!({"user_id": "u1", "chunk_size": 2}))
        .await
        .unwrap();
    assert_eq!(report["updated"], 3);
    assert_eq!(report["chunks_committed"], 2);

    let again = handle_method(&app, "order.backfill", &json!({"user_id": "u1"}))
        .await
        .unwrap();
    assert_eq!(again["planned"], 0);
    assert_eq!(again["updated"], 0);
}

#[tokio::test]
async fn test_order_backfill_numbering_override() {
    let (app, _tmp) = setup();
    add(&app, "u1", "2024-01-01T00:00:00Z", Some(4)).await;
    let b = add(&app, "u1", "2024-01-02T00:00:00Z", None).await;

    let report = handle_method(
        &app,
        "order.backfill",
        &json!({"user_id": "u1", "numbering": "unordered-subset", "guard": false}),
    )
    .await
    .unwrap();
    assert_eq!(report["assignments"], json!([{"id": b, "order": 1}]));
}

#[tokio::test]
async fn test_order_backfill_rejects_bad_params() {
    let (app, _tmp) = setup();
    let err = handle_method(&app, "order.backfill", &json!({})).await.unwrap_err();
    assert!(err.contains("missing user_id"));

    let err = handle_method(&app, "order.backfill", &json!({"user_id": "u1", "numbering": "random"}))
        .await
        .unwrap_err();
    assert!(err.contains("invalid numbering"));

    let err = handle_method(&app, "order.backfill", &json!({"user_id": "u1", "chunk_size": 0}))
        .await
        .unwrap_err();
    assert!(err.contains("invalid chunk_size"));
}

// ─── Settings ───

#[tokio::test]
async fn test_settings_get_redacts_token() {
    let (mut app, _tmp) = setup();
    app.settings.store.firestore.access_token = Some("secret".to_string());

    let res = handle_method(&app, "settings.get", &json!({})).await.unwrap();
    assert_eq!(res["store"]["firestore"]["access_token"], "***");
    assert_eq!(res["backfill"]["chunk_size"], 500);
    assert_eq!(res["backfill"]["numbering"], "query-position");
}
