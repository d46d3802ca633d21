//! Order backfill for bookmark documents.
//!
//! Reads every bookmark of one user ordered by creation time, gives the ones
//! without an `order` value a 1-based position, and commits the assignments
//! together with a server-side `updatedAt`. Records that already carry an
//! `order` (including `0`) are never touched, so a second run right after the
//! first writes nothing.
//!
//! Assignments are committed in chunks of at most `chunk_size` writes, each
//! chunk atomically. With the default chunk size any user with up to 500
//! bookmarks is patched in a single all-or-nothing commit.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::store::{DocumentStore, MAX_BATCH_WRITES};
use crate::types::backfill::{BackfillReport, PlannedAssignment};
use crate::types::document::{DocumentSnapshot, OwnerQuery, StagedUpdate, WriteBatch};
use crate::types::errors::{BackfillError, StoreError};
use crate::types::settings::{BackfillSettings, NumberingPolicy};

/// Per-run knobs. Defaults come from [`BackfillSettings`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillOptions {
    pub numbering: NumberingPolicy,
    pub chunk_size: usize,
    pub guard_concurrent_writes: bool,
    pub dry_run: bool,
}

impl BackfillOptions {
    pub fn from_settings(settings: &BackfillSettings) -> Self {
        Self {
            numbering: settings.numbering,
            chunk_size: settings.chunk_size,
            guard_concurrent_writes: settings.guard_concurrent_writes,
            dry_run: false,
        }
    }

    /// Chunk size clamped to what a single commit accepts.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_BATCH_WRITES)
    }
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self::from_settings(&BackfillSettings::default())
    }
}

/// Field names the backfill reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillFields {
    pub collection: String,
    pub owner: String,
    pub created: String,
    pub order: String,
    pub updated: String,
}

impl BackfillFields {
    pub fn new(collection: &str, settings: &BackfillSettings) -> Self {
        Self {
            collection: collection.to_string(),
            owner: settings.owner_field.clone(),
            created: settings.created_field.clone(),
            order: settings.order_field.clone(),
            updated: settings.updated_field.clone(),
        }
    }
}

/// Computes `order` assignments for the snapshots missing one.
///
/// `snapshots` must be in query order. With [`NumberingPolicy::QueryPosition`]
/// the value is the record's index in the full result plus one, so records
/// that already have an `order` still consume a number. With
/// [`NumberingPolicy::UnorderedSubset`] the missing records are numbered
/// `1..=n` among themselves.
pub fn plan_assignments(
    snapshots: &[DocumentSnapshot],
    order_field: &str,
    numbering: NumberingPolicy,
) -> Vec<PlannedAssignment> {
    snapshots
        .iter()
        .enumerate()
        .filter(|(_, snap)| !snap.has_defined(order_field))
        .enumerate()
        .map(|(subset_index, (query_index, snap))| {
            let position = match numbering {
                NumberingPolicy::QueryPosition => query_index,
                NumberingPolicy::UnorderedSubset => subset_index,
            };
            PlannedAssignment {
                id: snap.id.clone(),
                order: position as i64 + 1,
                precondition: snap.version.clone(),
            }
        })
        .collect()
}

/// Counts planned values already used by another record's `order`.
pub fn count_collisions(
    snapshots: &[DocumentSnapshot],
    order_field: &str,
    plan: &[PlannedAssignment],
) -> usize {
    let existing: HashSet<i64> = snapshots
        .iter()
        .filter_map(|snap| snap.get(order_field).and_then(whole_number))
        .collect();
    plan.iter().filter(|a| existing.contains(&a.order)).count()
}

/// Integer value of a JSON number, accepting floats with no fractional part.
fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// The order backfill operation bound to a store.
pub struct OrderBackfill<'a> {
    store: &'a dyn DocumentStore,
    fields: BackfillFields,
    options: BackfillOptions,
}

impl<'a> OrderBackfill<'a> {
    pub fn new(store: &'a dyn DocumentStore, fields: BackfillFields, options: BackfillOptions) -> Self {
        Self { store, fields, options }
    }

    pub fn options(&self) -> &BackfillOptions {
        &self.options
    }

    /// Runs the backfill for one user.
    ///
    /// # Errors
    /// Any query or commit failure aborts the run. It is logged once here and
    /// returned as [`BackfillError::Failed`]; chunks committed before the
    /// failure stay committed and are counted in the error.
    pub async fn run(&self, user_id: &str) -> Result<BackfillReport, BackfillError> {
        info!(
            user_id,
            backend = self.store.backend_name(),
            dry_run = self.options.dry_run,
            "starting order backfill"
        );

        let query = OwnerQuery {
            collection: self.fields.collection.clone(),
            owner_field: self.fields.owner.clone(),
            owner: user_id.to_string(),
            order_by: self.fields.created.clone(),
        };
        let snapshots = self
            .store
            .query_by_owner(&query)
            .await
            .map_err(|source| self.fail(user_id, 0, source))?;
        info!(user_id, found = snapshots.len(), "bookmarks found");

        let plan = plan_assignments(&snapshots, &self.fields.order, self.options.numbering);
        info!(user_id, to_update = plan.len(), "bookmarks missing order");

        let collisions = count_collisions(&snapshots, &self.fields.order, &plan);
        if collisions > 0 {
            warn!(
                user_id,
                collisions,
                numbering = ?self.options.numbering,
                "planned order values collide with existing ones"
            );
        }

        let mut report = BackfillReport {
            user_id: user_id.to_string(),
            found: snapshots.len(),
            already_ordered: snapshots.len() - plan.len(),
            planned: plan.len(),
            updated: 0,
            skipped: Vec::new(),
            chunks_committed: 0,
            collisions,
            dry_run: self.options.dry_run,
            assignments: Vec::new(),
        };

        if plan.is_empty() {
            info!(user_id, "nothing to do");
            return Ok(report);
        }
        if self.options.dry_run {
            info!(user_id, planned = plan.len(), "dry run; nothing committed");
            report.assignments = plan;
            return Ok(report);
        }

        let chunk_size = self.options.effective_chunk_size();
        for (index, chunk) in plan.chunks(chunk_size).enumerate() {
            let batch = self.stage(chunk);
            let outcome = self
                .store
                .commit(batch)
                .await
                .map_err(|source| self.fail(user_id, report.chunks_committed, source))?;
            debug!(
                user_id,
                chunk = index,
                applied = outcome.applied.len(),
                skipped = outcome.skipped.len(),
                "chunk committed"
            );
            report.updated += outcome.applied.len();
            report.skipped.extend(outcome.skipped);
            report.chunks_committed += 1;
        }

        if !report.skipped.is_empty() {
            warn!(
                user_id,
                skipped = report.skipped.len(),
                "bookmarks changed during the run were left untouched"
            );
        }
        info!(
            user_id,
            updated = report.updated,
            chunks = report.chunks_committed,
            "order backfill complete"
        );
        report.assignments = plan;
        Ok(report)
    }

    fn stage(&self, chunk: &[PlannedAssignment]) -> WriteBatch {
        let mut batch = WriteBatch::new(self.fields.collection.clone());
        for assignment in chunk {
            let precondition = if self.options.guard_concurrent_writes {
                assignment.precondition.clone()
            } else {
                None
            };
            batch.stage(
                StagedUpdate::new(assignment.id.clone())
                    .set_field(self.fields.order.clone(), Value::from(assignment.order))
                    .server_timestamp(self.fields.updated.clone())
                    .precondition(precondition),
            );
        }
        batch
    }

    fn fail(&self, user_id: &str, chunks_committed: usize, source: StoreError) -> BackfillError {
        error!(user_id, chunks_committed, error = %source, "order backfill failed");
        BackfillError::Failed {
            user_id: user_id.to_string(),
            chunks_committed,
            source,
        }
    }
}
