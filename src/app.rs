//! App Core for bookmark-admin.
//!
//! Holds the loaded settings and the document store they select, and is the
//! one place the CLI and the RPC server go through to run operations.

use std::path::PathBuf;
use std::sync::Arc;

use crate::platform;
use crate::services::order_backfill::{BackfillFields, BackfillOptions, OrderBackfill};
use crate::store::sqlite::SqliteDocumentStore;
use crate::store::DocumentStore;
use crate::types::backfill::BackfillReport;
use crate::types::document::{DocumentSnapshot, OwnerQuery};
use crate::types::errors::{BackfillError, StoreError};
use crate::types::settings::{AdminSettings, StoreBackend};

/// Central application struct: settings plus the selected store.
pub struct App {
    pub settings: AdminSettings,
    store: Arc<dyn DocumentStore>,
    /// Set when the backend is SQLite; needed for operations outside the store trait.
    sqlite: Option<Arc<SqliteDocumentStore>>,
}

impl App {
    /// Opens the store selected by `settings.store.backend`.
    pub fn new(settings: AdminSettings) -> Result<Self, StoreError> {
        match settings.store.backend {
            StoreBackend::Sqlite => {
                let path = settings
                    .store
                    .sqlite_path
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(platform::default_database_path);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::ConfigError(format!(
                            "cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
                let sqlite = Arc::new(SqliteDocumentStore::open(&path)?);
                Ok(Self::with_sqlite(settings, sqlite))
            }
            StoreBackend::Firestore => Self::open_firestore(settings),
        }
    }

    #[cfg(feature = "firestore")]
    fn open_firestore(settings: AdminSettings) -> Result<Self, StoreError> {
        use crate::store::firestore::{FirestoreConfig, FirestoreStore};

        let config = FirestoreConfig::from_settings(&settings.store.firestore)?;
        let store: Arc<dyn DocumentStore> = Arc::new(FirestoreStore::new(config)?);
        Ok(Self::with_store(settings, store))
    }

    #[cfg(not(feature = "firestore"))]
    fn open_firestore(_settings: AdminSettings) -> Result<Self, StoreError> {
        Err(StoreError::ConfigError(
            "built without the `firestore` feature".to_string(),
        ))
    }

    /// Wraps an already opened SQLite store.
    pub fn with_sqlite(settings: AdminSettings, sqlite: Arc<SqliteDocumentStore>) -> Self {
        let store: Arc<dyn DocumentStore> = sqlite.clone();
        Self {
            settings,
            store,
            sqlite: Some(sqlite),
        }
    }

    /// Wraps an arbitrary store.
    pub fn with_store(settings: AdminSettings, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            settings,
            store,
            sqlite: None,
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn sqlite(&self) -> Option<&SqliteDocumentStore> {
        self.sqlite.as_deref()
    }

    /// Run options from the settings, before any per-call override.
    pub fn default_backfill_options(&self) -> BackfillOptions {
        BackfillOptions::from_settings(&self.settings.backfill)
    }

    pub fn backfill_fields(&self) -> BackfillFields {
        BackfillFields::new(&self.settings.store.collection, &self.settings.backfill)
    }

    /// Runs the order backfill for one user.
    pub async fn backfill_order(
        &self,
        user_id: &str,
        options: BackfillOptions,
    ) -> Result<BackfillReport, BackfillError> {
        OrderBackfill::new(self.store(), self.backfill_fields(), options)
            .run(user_id)
            .await
    }

    /// Lists a user's bookmark documents through the store, ascending by creation time.
    pub async fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentSnapshot>, StoreError> {
        let fields = self.backfill_fields();
        let query = OwnerQuery {
            collection: fields.collection,
            owner_field: fields.owner,
            owner: user_id.to_string(),
            order_by: fields.created,
        };
        self.store.query_by_owner(&query).await
    }
}
