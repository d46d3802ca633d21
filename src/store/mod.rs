//! Document store contract.
//!
//! The order backfill only needs three things from a store: an owner-scoped
//! ordered query, partial updates with server timestamps, and an atomic
//! multi-document commit. [`DocumentStore`] captures exactly that so the same
//! operation runs against Firestore or a local SQLite replica.

use async_trait::async_trait;

use crate::types::document::{CommitOutcome, DocumentSnapshot, OwnerQuery, WriteBatch};
use crate::types::errors::StoreError;

#[cfg(feature = "firestore")]
pub mod firestore;
#[cfg(feature = "firestore")]
pub mod firestore_value;
pub mod sqlite;

/// Maximum number of writes accepted in one commit (Firestore's limit).
pub const MAX_BATCH_WRITES: usize = 500;

/// Operations a document store must provide.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns every document of `query.collection` whose `owner_field` equals
    /// `owner`, ascending by `order_by`. Documents without `order_by` are not returned.
    async fn query_by_owner(&self, query: &OwnerQuery) -> Result<Vec<DocumentSnapshot>, StoreError>;

    /// Commits all staged updates atomically.
    ///
    /// Updates whose precondition no longer holds are left out and reported in
    /// [`CommitOutcome::skipped`]; the remaining updates apply together or not
    /// at all. An unguarded update targeting a missing document fails the
    /// whole batch; a guarded one is skipped.
    async fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome, StoreError>;

    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;
}

/// Rejects batches above [`MAX_BATCH_WRITES`].
pub fn check_batch_size(batch: &WriteBatch) -> Result<(), StoreError> {
    if batch.len() > MAX_BATCH_WRITES {
        return Err(StoreError::BatchTooLarge {
            size: batch.len(),
            limit: MAX_BATCH_WRITES,
        });
    }
    Ok(())
}
