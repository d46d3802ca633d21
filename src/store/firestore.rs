//! Firestore REST-backed [`DocumentStore`].
//!
//! Talks to the Firestore v1 REST API with `reqwest`:
//! - `documents:runQuery` for the owner query,
//! - `documents:commit` for atomic batches,
//! - `documents:batchGet` to find stale writes after a failed precondition.
//!
//! When an emulator host is configured, requests go to `http://{host}/v1` and
//! authenticate as the emulator's `owner` principal.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::store::firestore_value::{decode_fields, encode_fields, quote_field_path};
use crate::store::{check_batch_size, DocumentStore};
use crate::types::document::{
    CommitOutcome, DocumentSnapshot, DocumentVersion, OwnerQuery, StagedUpdate, WriteBatch,
};
use crate::types::errors::StoreError;
use crate::types::settings::FirestoreSettings;

const PRODUCTION_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const EMULATOR_OWNER_TOKEN: &str = "owner";

/// OAuth access token, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Connection parameters for a Firestore database.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database_id: String,
    pub emulator_host: Option<String>,
    pub access_token: Option<AccessToken>,
    pub timeout: Duration,
}

impl FirestoreConfig {
    /// Builds a config from settings. A project id is required.
    pub fn from_settings(settings: &FirestoreSettings) -> Result<Self, StoreError> {
        let project_id = settings
            .project_id
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| StoreError::ConfigError("store.firestore.project_id is not set".to_string()))?;
        Ok(Self {
            project_id,
            database_id: settings.database_id.clone(),
            emulator_host: settings.emulator_host.clone(),
            access_token: settings.access_token.as_deref().map(AccessToken::new),
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
        })
    }

    pub fn base_url(&self) -> String {
        match &self.emulator_host {
            Some(host) => format!("http://{}/v1", host.trim_end_matches('/')),
            None => PRODUCTION_BASE_URL.to_string(),
        }
    }

    /// `projects/{project}/databases/{database}/documents`
    pub fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database_id
        )
    }
}

/// Document store over the Firestore REST API.
pub struct FirestoreStore {
    client: Client,
    config: FirestoreConfig,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    /// Full resource name of a document.
    pub fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.config.documents_root(), collection, id)
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/{}:{}",
            self.config.base_url(),
            self.config.documents_root(),
            method
        )
    }

    fn bearer(&self) -> Option<&str> {
        match (&self.config.access_token, &self.config.emulator_host) {
            (Some(token), _) => Some(token.expose()),
            (None, Some(_)) => Some(EMULATOR_OWNER_TOKEN),
            (None, None) => None,
        }
    }

    async fn post(&self, method: &str, body: &Value) -> Result<Value, StoreError> {
        let mut request = self.client.post(self.endpoint(method)).json(body);
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(api_error(status, &text));
        }
        serde_json::from_str(&text)
            .map_err(|e| StoreError::DecodeError(format!("{} response: {}", method, e)))
    }

    fn write_for(&self, collection: &str, update: &StagedUpdate) -> Value {
        let mask: Vec<String> = update.set.keys().map(|k| quote_field_path(k)).collect();
        let mut write = json!({
            "update": {
                "name": self.document_name(collection, &update.id),
                "fields": encode_fields(&update.set),
            },
            "updateMask": { "fieldPaths": mask },
        });

        if !update.server_timestamps.is_empty() {
            let transforms: Vec<Value> = update
                .server_timestamps
                .iter()
                .map(|field| {
                    json!({
                        "fieldPath": quote_field_path(field),
                        "setToServerValue": "REQUEST_TIME",
                    })
                })
                .collect();
            write["updateTransforms"] = Value::Array(transforms);
        }

        write["currentDocument"] = match &update.precondition {
            Some(version) => json!({ "updateTime": version.as_str() }),
            None => json!({ "exists": true }),
        };
        write
    }

    /// Builds the `documents:commit` request body for a set of updates.
    pub fn commit_body(&self, collection: &str, updates: &[StagedUpdate]) -> Value {
        let writes: Vec<Value> = updates
            .iter()
            .map(|u| self.write_for(collection, u))
            .collect();
        json!({ "writes": writes })
    }

    /// Builds the `documents:runQuery` request body for an owner query.
    pub fn query_body(&self, query: &OwnerQuery) -> Value {
        json!({
            "structuredQuery": {
                "from": [{ "collectionId": query.collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": quote_field_path(&query.owner_field) },
                        "op": "EQUAL",
                        "value": { "stringValue": query.owner },
                    }
                },
                "orderBy": [{
                    "field": { "fieldPath": quote_field_path(&query.order_by) },
                    "direction": "ASCENDING",
                }],
            }
        })
    }

    async fn commit_once(&self, collection: &str, updates: &[StagedUpdate]) -> Result<(), StoreError> {
        let body = self.commit_body(collection, updates);
        let response = self.post("commit", &body).await?;
        let written = response
            .get("writeResults")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        debug!(collection, writes = written, "firestore commit applied");
        Ok(())
    }

    /// Current `updateTime` of each named document; `None` when it no longer exists.
    async fn current_versions(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, Option<String>>, StoreError> {
        let response = self.post("batchGet", &json!({ "documents": names })).await?;
        let entries = response
            .as_array()
            .ok_or_else(|| StoreError::DecodeError("batchGet response is not an array".to_string()))?;

        let mut versions = HashMap::new();
        for entry in entries {
            if let Some(found) = entry.get("found") {
                let name = found
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| StoreError::DecodeError("found document without name".to_string()))?;
                let update_time = found
                    .get("updateTime")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                versions.insert(name.to_string(), update_time);
            } else if let Some(missing) = entry.get("missing").and_then(Value::as_str) {
                versions.insert(missing.to_string(), None);
            }
        }
        Ok(versions)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn query_by_owner(&self, query: &OwnerQuery) -> Result<Vec<DocumentSnapshot>, StoreError> {
        let response = self.post("runQuery", &self.query_body(query)).await?;
        let entries = response
            .as_array()
            .ok_or_else(|| StoreError::DecodeError("runQuery response is not an array".to_string()))?;

        let mut results = Vec::new();
        for entry in entries {
            // Entries without a document only carry readTime / progress info.
            if let Some(doc) = entry.get("document") {
                results.push(parse_document(doc)?);
            }
        }
        Ok(results)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome, StoreError> {
        check_batch_size(&batch)?;
        if batch.is_empty() {
            return Ok(CommitOutcome::default());
        }

        let err = match self.commit_once(&batch.collection, &batch.updates).await {
            Ok(()) => {
                return Ok(CommitOutcome {
                    applied: batch.updates.iter().map(|u| u.id.clone()).collect(),
                    skipped: Vec::new(),
                })
            }
            Err(err) => err,
        };

        let conflict = matches!(err, StoreError::PreconditionFailed(_) | StoreError::NotFound(_));
        if !conflict || batch.updates.iter().all(|u| u.precondition.is_none()) {
            return Err(err);
        }

        let names: Vec<String> = batch
            .updates
            .iter()
            .map(|u| self.document_name(&batch.collection, &u.id))
            .collect();
        let current = self.current_versions(&names).await?;

        let mut keep = Vec::new();
        let mut skipped = Vec::new();
        for (update, name) in batch.updates.into_iter().zip(names.iter()) {
            let still_valid = match &update.precondition {
                None => true,
                Some(expected) => {
                    matches!(current.get(name), Some(Some(actual)) if actual == expected.as_str())
                }
            };
            if still_valid {
                keep.push(update);
            } else {
                skipped.push(update.id);
            }
        }

        if skipped.is_empty() {
            // Nothing changed underneath us, so the failure has another cause.
            return Err(err);
        }
        warn!(
            collection = %batch.collection,
            skipped = skipped.len(),
            "documents changed since read; retrying commit without them"
        );

        if !keep.is_empty() {
            self.commit_once(&batch.collection, &keep).await?;
        }
        Ok(CommitOutcome {
            applied: keep.into_iter().map(|u| u.id).collect(),
            skipped,
        })
    }

    fn backend_name(&self) -> &'static str {
        "firestore"
    }
}

fn parse_document(doc: &Value) -> Result<DocumentSnapshot, StoreError> {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::DecodeError("document without name".to_string()))?;
    let id = name.rsplit('/').next().unwrap_or(name).to_string();
    let fields = match doc.get("fields").and_then(Value::as_object) {
        Some(typed) => decode_fields(typed)?,
        None => Map::new(),
    };
    let version = doc
        .get("updateTime")
        .and_then(Value::as_str)
        .map(DocumentVersion::new);
    Ok(DocumentSnapshot { id, fields, version })
}

fn api_error(status: StatusCode, body: &str) -> StoreError {
    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.status, envelope.error.message),
        Err(_) => (String::new(), body.to_string()),
    };

    match code.as_str() {
        "PERMISSION_DENIED" | "UNAUTHENTICATED" => StoreError::PermissionDenied(message),
        "RESOURCE_EXHAUSTED" => StoreError::QuotaExceeded(message),
        "FAILED_PRECONDITION" | "ABORTED" => StoreError::PreconditionFailed(message),
        "NOT_FOUND" => StoreError::NotFound(message),
        "" => match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied(message),
            StatusCode::TOO_MANY_REQUESTS => StoreError::QuotaExceeded(message),
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                StoreError::PreconditionFailed(message)
            }
            _ => StoreError::ApiError {
                status: status.as_u16().to_string(),
                message,
            },
        },
        _ => StoreError::ApiError { status: code, message },
    }
}
