//! bookmark-admin RPC server: JSON-RPC over stdin/stdout for operator tooling.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"order.backfill", "params":{"user_id":"u1"}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//!
//! Logs go to stderr; stdout carries only protocol lines.

use std::error::Error;
use std::io::{self, Write};
use std::time::Instant;

use clap::Parser;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use bookmark_admin::app::App;
use bookmark_admin::rpc_handler::handle_method;
use bookmark_admin::services::logging::init_logging;
use bookmark_admin::services::settings_engine::{SettingsEngine, SettingsEngineTrait};

/// Requests accepted per one-second window.
const MAX_REQUESTS_PER_SECOND: u32 = 200;

#[derive(Parser, Debug)]
#[command(name = "bookmark-admin-rpc", version, about = "JSON-RPC server for bookmark maintenance")]
struct Args {
    /// Settings file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<String>,
}

/// Fixed-window rate limiter.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn emit(message: &Value) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", message)?;
    out.flush()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mut engine = SettingsEngine::new(args.config);
    let mut settings = engine.load()?;
    settings.apply_env_overrides(|key| std::env::var(key).ok());
    init_logging(&settings.logging)?;

    let app = App::new(settings)?;
    info!(backend = app.store().backend_name(), "RPC server ready");
    emit(&json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}))?;

    let mut rate_limiter = RateLimiter::new(MAX_REQUESTS_PER_SECOND);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                emit(&json!({"id": null, "error": format!("parse error: {}", e)}))?;
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            warn!("rate limit exceeded");
            emit(&json!({"id": id, "error": "rate limit exceeded"}))?;
            continue;
        }

        let method = req.get("method").and_then(Value::as_str).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or_else(|| json!({}));

        let response = match handle_method(&app, method, &params).await {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => json!({"id": id, "error": err}),
        };
        emit(&response)?;
    }

    info!("stdin closed, shutting down");
    Ok(())
}
