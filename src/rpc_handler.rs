//! RPC method handler for the operations JSON-RPC protocol.
//!
//! Kept apart from `rpc_server.rs` so it can be unit-tested without stdio.
//! `handle_method` dispatches a method name and its params to the `App`.

use serde_json::{json, Value};

use crate::app::App;
use crate::managers::bookmark_manager::{BookmarkManager, BookmarkManagerTrait, NewBookmark};
use crate::services::order_backfill::BackfillOptions;
use crate::types::bookmark::timestamp;
use crate::types::settings::NumberingPolicy;

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing {}", key))
}

/// Builds run options from the app defaults plus optional per-call overrides.
fn backfill_options(app: &App, params: &Value, dry_run: bool) -> Result<BackfillOptions, String> {
    let mut options = app.default_backfill_options();
    options.dry_run = dry_run;

    if let Some(size) = params.get("chunk_size") {
        let size = size.as_u64().filter(|n| *n > 0).ok_or("invalid chunk_size")?;
        options.chunk_size = size as usize;
    }
    if let Some(numbering) = params.get("numbering") {
        options.numbering = serde_json::from_value::<NumberingPolicy>(numbering.clone())
            .map_err(|e| format!("invalid numbering: {}", e))?;
    }
    if let Some(guard) = params.get("guard") {
        options.guard_concurrent_writes = guard.as_bool().ok_or("invalid guard")?;
    }
    Ok(options)
}

/// Dispatch a JSON-RPC method call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Order backfill ───
        "order.backfill" | "order.preview" => {
            let user_id = required_str(params, "user_id")?;
            let options = backfill_options(app, params, method == "order.preview")?;
            let report = app
                .backfill_order(user_id, options)
                .await
                .map_err(|e| e.to_string())?;
            serde_json::to_value(report).map_err(|e| e.to_string())
        }

        // ─── Bookmarks ───
        "bookmark.list" => {
            let user_id = required_str(params, "user_id")?;
            let docs = app.list_documents(user_id).await.map_err(|e| e.to_string())?;
            let items: Vec<Value> = docs
                .into_iter()
                .map(|d| {
                    json!({
                        "id": d.id,
                        "fields": Value::Object(d.fields),
                        "version": d.version.map(|v| v.0),
                    })
                })
                .collect();
            Ok(json!({"items": items}))
        }
        "bookmark.add" => {
            let sqlite = app
                .sqlite()
                .ok_or("bookmark.add requires the sqlite backend")?;
            let user_id = required_str(params, "user_id")?;
            let url = required_str(params, "url")?;
            let title = required_str(params, "title")?;

            let mut new = NewBookmark::new(user_id, url, title);
            if let Some(raw) = params.get("created_at").and_then(Value::as_str) {
                let at = timestamp::parse(raw).map_err(|e| format!("invalid created_at: {}", e))?;
                new = new.created_at(at);
            }
            if let Some(order) = params.get("order") {
                new = new.order(order.as_i64().ok_or("invalid order")?);
            }

            let db = sqlite.lock().map_err(|e| e.to_string())?;
            let mut mgr = BookmarkManager::with_collection(db.connection(), &app.settings.store.collection);
            let id = mgr.add_bookmark(new).map_err(|e| e.to_string())?;
            Ok(json!({"id": id, "url": url, "title": title}))
        }

        // ─── Settings ───
        "settings.get" => {
            let mut settings = serde_json::to_value(&app.settings).map_err(|e| e.to_string())?;
            if let Some(token) = settings.pointer_mut("/store/firestore/access_token") {
                if !token.is_null() {
                    *token = json!("***");
                }
            }
            Ok(settings)
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
