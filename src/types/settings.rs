use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::bookmark::BOOKMARKS_COLLECTION;

/// Environment variable naming a Firestore emulator (`host:port`).
pub const ENV_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";
/// Environment variable overriding the Firestore project id.
pub const ENV_PROJECT: &str = "BOOKMARK_ADMIN_PROJECT";
/// Environment variable holding a Firestore OAuth access token.
pub const ENV_TOKEN: &str = "BOOKMARK_ADMIN_TOKEN";
/// Environment variable overriding the SQLite database path.
pub const ENV_DB: &str = "BOOKMARK_ADMIN_DB";

/// Top-level operator settings container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdminSettings {
    pub store: StoreSettings,
    pub backfill: BackfillSettings,
    pub logging: LoggingSettings,
}

impl AdminSettings {
    /// Applies environment overrides on top of the loaded file.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_EMULATOR_HOST).filter(|v| !v.is_empty()) {
            self.store.firestore.emulator_host = Some(host);
        }
        if let Some(project) = lookup(ENV_PROJECT).filter(|v| !v.is_empty()) {
            self.store.firestore.project_id = Some(project);
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            self.store.firestore.access_token = Some(token);
        }
        if let Some(path) = lookup(ENV_DB).filter(|v| !v.is_empty()) {
            self.store.sqlite_path = Some(path);
        }
    }
}

/// Which document store backs the tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Firestore,
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub collection: String,
    /// SQLite database file. `None` means `bookmarks.db` in the platform data dir.
    pub sqlite_path: Option<String>,
    pub firestore: FirestoreSettings,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            collection: BOOKMARKS_COLLECTION.to_string(),
            sqlite_path: None,
            firestore: FirestoreSettings::default(),
        }
    }
}

/// Firestore REST connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FirestoreSettings {
    pub project_id: Option<String>,
    pub database_id: String,
    pub emulator_host: Option<String>,
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for FirestoreSettings {
    fn default() -> Self {
        Self {
            project_id: None,
            database_id: "(default)".to_string(),
            emulator_host: None,
            access_token: None,
            timeout_secs: 30,
        }
    }
}

/// How missing `order` values are numbered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NumberingPolicy {
    /// Position in the full owner query, 1-based. Records that already have an
    /// `order` still consume a position.
    QueryPosition,
    /// Position among the records missing `order` only, 1-based.
    UnorderedSubset,
}

/// Order backfill settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackfillSettings {
    pub owner_field: String,
    pub created_field: String,
    pub order_field: String,
    pub updated_field: String,
    /// Maximum writes per atomic commit. Clamped to `1..=500`.
    pub chunk_size: usize,
    pub numbering: NumberingPolicy,
    /// Attach each record's version as a write precondition.
    pub guard_concurrent_writes: bool,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            owner_field: "userId".to_string(),
            created_field: "createdAt".to_string(),
            order_field: "order".to_string(),
            updated_field: "updatedAt".to_string(),
            chunk_size: 500,
            numbering: NumberingPolicy::QueryPosition,
            guard_concurrent_writes: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
