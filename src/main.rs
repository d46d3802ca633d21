//! bookmark-admin: operator CLI for bookmark maintenance.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::error::Error;

use clap::{Parser, Subcommand};
use serde_json::json;

use bookmark_admin::app::App;
use bookmark_admin::managers::bookmark_manager::{BookmarkManager, BookmarkManagerTrait, NewBookmark};
use bookmark_admin::services::logging::init_logging;
use bookmark_admin::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use bookmark_admin::types::bookmark::timestamp;
use bookmark_admin::types::errors::StoreError;
use bookmark_admin::types::settings::{AdminSettings, LogFormat, NumberingPolicy, StoreBackend};

#[derive(Parser, Debug)]
#[command(name = "bookmark-admin", about = "Maintenance operations for bookmark collections", version)]
struct Cli {
    /// Settings file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<String>,
    /// Document store to operate on
    #[arg(long, global = true, value_enum)]
    backend: Option<StoreBackend>,
    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assign a display order to a user's bookmarks that have none
    BackfillOrder {
        /// Owner whose bookmarks are backfilled
        #[arg(long)]
        user: String,
        /// Plan only, write nothing
        #[arg(long)]
        dry_run: bool,
        /// Writes per atomic commit (1-500)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// How missing orders are numbered
        #[arg(long, value_enum)]
        numbering: Option<NumberingPolicy>,
        /// Write without checking that records are unchanged since the query
        #[arg(long)]
        no_guard: bool,
    },
    /// List a user's bookmarks ascending by creation time
    List {
        #[arg(long)]
        user: String,
    },
    /// Add a bookmark to the local store
    Add {
        #[arg(long)]
        user: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        title: String,
        /// RFC 3339 creation time (defaults to now)
        #[arg(long)]
        created_at: Option<String>,
        #[arg(long)]
        order: Option<i64>,
    },
    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Set one value by dot-separated key, e.g. `backfill.chunk_size 200`
    Set { key: String, value: String },
    /// Restore defaults
    Reset,
    /// Print the settings file path
    Path,
}

fn run_config(
    engine: &mut SettingsEngine,
    mut settings: AdminSettings,
    action: ConfigAction,
) -> Result<(), Box<dyn Error>> {
    match action {
        ConfigAction::Show => {
            if settings.store.firestore.access_token.is_some() {
                settings.store.firestore.access_token = Some("***".to_string());
            }
            print_json(&settings)?;
        }
        ConfigAction::Set { key, value } => {
            engine.set_value(&key, SettingsEngine::parse_cli_value(&value))?;
            println!("{} updated in {}", key, engine.get_config_path());
        }
        ConfigAction::Reset => {
            engine.reset()?;
            println!("settings reset in {}", engine.get_config_path());
        }
        ConfigAction::Path => println!("{}", engine.get_config_path()),
    }
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut engine = SettingsEngine::new(cli.config);
    let mut settings = engine.load()?;
    settings.apply_env_overrides(|key| std::env::var(key).ok());
    if let Some(backend) = cli.backend {
        settings.store.backend = backend;
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    init_logging(&settings.logging)?;

    match cli.command {
        Command::Config { action } => run_config(&mut engine, settings, action)?,
        Command::BackfillOrder { user, dry_run, chunk_size, numbering, no_guard } => {
            let app = App::new(settings)?;
            let mut options = app.default_backfill_options();
            options.dry_run = dry_run;
            if let Some(size) = chunk_size {
                options.chunk_size = size;
            }
            if let Some(numbering) = numbering {
                options.numbering = numbering;
            }
            if no_guard {
                options.guard_concurrent_writes = false;
            }
            let report = app.backfill_order(&user, options).await?;
            print_json(&report)?;
        }
        Command::List { user } => {
            let app = App::new(settings)?;
            let docs = app.list_documents(&user).await?;
            let items: Vec<_> = docs
                .into_iter()
                .map(|d| json!({"id": d.id, "fields": d.fields, "version": d.version}))
                .collect();
            print_json(&items)?;
        }
        Command::Add { user, url, title, created_at, order } => {
            let app = App::new(settings)?;
            let sqlite = app.sqlite().ok_or_else(|| {
                StoreError::ConfigError("add requires the sqlite backend".to_string())
            })?;
            let mut new = NewBookmark::new(&user, &url, &title);
            if let Some(raw) = created_at {
                new = new.created_at(timestamp::parse(&raw)?);
            }
            if let Some(order) = order {
                new = new.order(order);
            }
            let db = sqlite.lock()?;
            let mut mgr = BookmarkManager::with_collection(db.connection(), &app.settings.store.collection);
            let id = mgr.add_bookmark(new)?;
            print_json(&json!({"id": id}))?;
        }
    }

    Ok(())
}
