use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque per-document version token assigned by the store.
///
/// SQLite uses the value of its database-wide revision counter, Firestore the
/// document `updateTime`. Any write to the document produces a new token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentVersion(pub String);

impl DocumentVersion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A document as read from a store query.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub fields: Map<String, Value>,
    pub version: Option<DocumentVersion>,
}

impl DocumentSnapshot {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// A field counts as defined when it is present and not null.
    pub fn has_defined(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(v) if !v.is_null())
    }
}

/// Equality filter on an owner field, ordered ascending by another field.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerQuery {
    pub collection: String,
    pub owner_field: String,
    pub owner: String,
    pub order_by: String,
}

/// Partial update of one document, staged for a batch commit.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedUpdate {
    pub id: String,
    /// Fields overwritten with the given values.
    pub set: Map<String, Value>,
    /// Fields set to the store's clock at commit time.
    pub server_timestamps: Vec<String>,
    /// When present, the write only applies if the document still has this version.
    pub precondition: Option<DocumentVersion>,
}

impl StagedUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            set: Map::new(),
            server_timestamps: Vec::new(),
            precondition: None,
        }
    }

    pub fn set_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set.insert(field.into(), value);
        self
    }

    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.server_timestamps.push(field.into());
        self
    }

    pub fn precondition(mut self, version: Option<DocumentVersion>) -> Self {
        self.precondition = version;
        self
    }
}

/// A set of updates committed atomically against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBatch {
    pub collection: String,
    pub updates: Vec<StagedUpdate>,
}

impl WriteBatch {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            updates: Vec::new(),
        }
    }

    pub fn stage(&mut self, update: StagedUpdate) {
        self.updates.push(update);
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommitOutcome {
    /// Ids of documents whose update was applied.
    pub applied: Vec<String>,
    /// Ids excluded because their version precondition no longer held.
    pub skipped: Vec<String>,
}
