use thiserror::Error;

// === StoreError ===

/// Errors raised by a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Local database operation failed.
    #[error("Store database error: {0}")]
    DatabaseError(String),
    /// The request never reached the store or the response was cut off.
    #[error("Store network error: {0}")]
    NetworkError(String),
    /// The caller is not allowed to perform the operation.
    #[error("Store permission denied: {0}")]
    PermissionDenied(String),
    /// The store rejected the request because a quota or rate limit was hit.
    #[error("Store quota exhausted: {0}")]
    QuotaExceeded(String),
    /// A write precondition did not hold.
    #[error("Store precondition failed: {0}")]
    PreconditionFailed(String),
    /// A write targeted a document that does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),
    /// The batch exceeds the store's per-commit mutation limit.
    #[error("Batch of {size} writes exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    /// The store returned data that could not be decoded.
    #[error("Store decode error: {0}")]
    DecodeError(String),
    /// Any other error reported by the store API.
    #[error("Store API error ({status}): {message}")]
    ApiError { status: String, message: String },
    /// The store is not configured well enough to connect.
    #[error("Store configuration error: {0}")]
    ConfigError(String),
}

// === BookmarkError ===

/// Errors related to bookmark management operations.
#[derive(Debug, Error)]
pub enum BookmarkError {
    /// Bookmark with the given ID was not found.
    #[error("Bookmark not found: {0}")]
    NotFound(String),
    /// The URL does not use an allowed scheme.
    #[error("Invalid bookmark URL: {0}")]
    InvalidUrl(String),
    /// The owning user id is empty.
    #[error("Bookmark owner must not be empty")]
    MissingOwner,
    /// The stored document could not be (de)serialized.
    #[error("Bookmark serialization error: {0}")]
    SerializationError(String),
    /// Database operation failed.
    #[error("Bookmark database error: {0}")]
    DatabaseError(String),
}

// === BackfillError ===

/// The single failure kind of the order backfill operation.
///
/// Query, network, permission, quota and commit failures are not told apart
/// at this level; the underlying [`StoreError`] is kept as the source.
#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("Order backfill failed for user {user_id} ({chunks_committed} chunk(s) committed): {source}")]
    Failed {
        user_id: String,
        chunks_committed: usize,
        #[source]
        source: StoreError,
    },
}

impl BackfillError {
    pub fn user_id(&self) -> &str {
        match self {
            BackfillError::Failed { user_id, .. } => user_id,
        }
    }

    pub fn chunks_committed(&self) -> usize {
        match self {
            BackfillError::Failed { chunks_committed, .. } => *chunks_committed,
        }
    }

    pub fn store_error(&self) -> &StoreError {
        match self {
            BackfillError::Failed { source, .. } => source,
        }
    }
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === LogError ===

/// Errors raised while installing the log subscriber.
#[derive(Debug, Error)]
pub enum LogError {
    /// Logging was already initialized in this process.
    #[error("Logging already initialized")]
    AlreadyInitialized,
    /// The filter directive could not be parsed.
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    /// The global subscriber could not be installed.
    #[error("Failed to install log subscriber: {0}")]
    InstallFailed(String),
}
