//! SQLite-backed [`DocumentStore`].
//!
//! Documents live in the `documents` table as JSON objects. Field access goes
//! through SQLite's `json_extract`, and a batch commit is a single transaction.
//! Version tokens come from the database-wide revision counter, so a document
//! that is deleted and recreated never repeats an earlier token.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};

use crate::database::{next_revision, Database};
use crate::store::{check_batch_size, DocumentStore};
use crate::types::bookmark::timestamp;
use crate::types::document::{
    CommitOutcome, DocumentSnapshot, DocumentVersion, OwnerQuery, WriteBatch,
};
use crate::types::errors::StoreError;

/// Document store over a local SQLite database.
pub struct SqliteDocumentStore {
    db: Mutex<Database>,
}

impl SqliteDocumentStore {
    /// Opens (or creates) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::open(path).map_err(db_err)?;
        Ok(Self::new(db))
    }

    /// Opens a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Database::open_in_memory().map_err(db_err)?;
        Ok(Self::new(db))
    }

    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Locks the database for direct use, e.g. by a `BookmarkManager`.
    pub fn lock(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.db
            .lock()
            .map_err(|e| StoreError::DatabaseError(format!("database lock poisoned: {}", e)))
    }

    /// Inserts or replaces a document, returning its new version.
    pub fn put_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<DocumentVersion, StoreError> {
        let data = serde_json::to_string(fields)
            .map_err(|e| StoreError::DecodeError(e.to_string()))?;
        let db = self.lock()?;
        let tx = db.connection().unchecked_transaction().map_err(db_err)?;
        let revision = next_revision(&tx).map_err(db_err)?;
        tx.execute(
            "INSERT INTO documents (collection, id, data, revision) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, revision = excluded.revision",
            params![collection, id, data, revision],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(DocumentVersion::new(revision.to_string()))
    }

    /// Reads a single document.
    pub fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<DocumentSnapshot>, StoreError> {
        let db = self.lock()?;
        let row: Option<(String, i64)> = db
            .connection()
            .query_row(
                "SELECT data, revision FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;
        row.map(|(data, revision)| snapshot(id.to_string(), &data, revision))
            .transpose()
    }

    fn query_blocking(&self, query: &OwnerQuery) -> Result<Vec<DocumentSnapshot>, StoreError> {
        let db = self.lock()?;
        let mut stmt = db
            .connection()
            .prepare(
                "SELECT id, data, revision FROM documents \
                 WHERE collection = ?1 AND json_extract(data, ?2) = ?3 \
                   AND json_extract(data, ?4) IS NOT NULL \
                 ORDER BY rowid",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(
                params![
                    query.collection,
                    json_path(&query.owner_field),
                    query.owner,
                    json_path(&query.order_by)
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .map_err(db_err)?;

        let mut results = Vec::new();
        for row in rows {
            let (id, data, revision) = row.map_err(db_err)?;
            results.push(snapshot(id, &data, revision)?);
        }
        // Stable, so equal sort values keep insertion order.
        results.sort_by(|a, b| match (a.get(&query.order_by), b.get(&query.order_by)) {
            (Some(x), Some(y)) => compare_values(x, y),
            _ => Ordering::Equal,
        });
        Ok(results)
    }

    fn commit_blocking(&self, batch: &WriteBatch) -> Result<CommitOutcome, StoreError> {
        check_batch_size(batch)?;
        let db = self.lock()?;
        let tx = db.connection().unchecked_transaction().map_err(db_err)?;
        let stamp = Value::String(timestamp::now());
        let mut outcome = CommitOutcome::default();

        for update in &batch.updates {
            let current: Option<(String, i64)> = tx
                .query_row(
                    "SELECT data, revision FROM documents WHERE collection = ?1 AND id = ?2",
                    params![batch.collection, update.id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(db_err)?;

            // Dropping `tx` on any early return rolls the whole batch back.
            let Some((data, revision)) = current else {
                if update.precondition.is_some() {
                    outcome.skipped.push(update.id.clone());
                    continue;
                }
                return Err(StoreError::NotFound(format!(
                    "{}/{}",
                    batch.collection, update.id
                )));
            };

            if let Some(expected) = &update.precondition {
                if expected.as_str() != revision.to_string() {
                    outcome.skipped.push(update.id.clone());
                    continue;
                }
            }

            let mut fields = parse_fields(&data)?;
            for (field, value) in &update.set {
                fields.insert(field.clone(), value.clone());
            }
            for field in &update.server_timestamps {
                fields.insert(field.clone(), stamp.clone());
            }
            let data = serde_json::to_string(&fields)
                .map_err(|e| StoreError::DecodeError(e.to_string()))?;

            let next = next_revision(&tx).map_err(db_err)?;
            tx.execute(
                "UPDATE documents SET data = ?1, revision = ?2 WHERE collection = ?3 AND id = ?4",
                params![data, next, batch.collection, update.id],
            )
            .map_err(db_err)?;
            outcome.applied.push(update.id.clone());
        }

        tx.commit().map_err(db_err)?;
        Ok(outcome)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn query_by_owner(&self, query: &OwnerQuery) -> Result<Vec<DocumentSnapshot>, StoreError> {
        self.query_blocking(query)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome, StoreError> {
        self.commit_blocking(&batch)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}

fn parse_fields(data: &str) -> Result<Map<String, Value>, StoreError> {
    match serde_json::from_str(data) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::DecodeError(format!(
            "document body is not an object: {}",
            other
        ))),
        Err(e) => Err(StoreError::DecodeError(e.to_string())),
    }
}

fn snapshot(id: String, data: &str, revision: i64) -> Result<DocumentSnapshot, StoreError> {
    Ok(DocumentSnapshot {
        id,
        fields: parse_fields(data)?,
        version: Some(DocumentVersion::new(revision.to_string())),
    })
}

/// Orders two field values the way the owner query sorts them.
///
/// Values rank booleans, then numbers, then RFC 3339 timestamps by instant,
/// then other strings. Timestamps written with any precision or UTC offset
/// compare chronologically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(s) if timestamp::parse(s).is_ok() => 3,
            Value::String(_) => 4,
            Value::Array(_) | Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => match (timestamp::parse(x), timestamp::parse(y)) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => x.cmp(y),
        },
        _ => match rank(a).cmp(&rank(b)) {
            Ordering::Equal => a.to_string().cmp(&b.to_string()),
            other => other,
        },
    }
}

/// Builds a SQLite JSON path for a top-level field, quoting it when needed.
pub fn json_path(field: &str) -> String {
    let simple = field
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        format!("$.{}", field)
    } else {
        format!("$.\"{}\"", field.replace('"', "\\\""))
    }
}
