use serde::Serialize;

use super::document::DocumentVersion;

/// One planned `order` assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedAssignment {
    pub id: String,
    pub order: i64,
    #[serde(skip)]
    pub precondition: Option<DocumentVersion>,
}

/// Summary of an order backfill run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillReport {
    pub user_id: String,
    /// Records returned by the owner query.
    pub found: usize,
    /// Records that already carried an `order` value.
    pub already_ordered: usize,
    /// Records that were missing `order` and received an assignment.
    pub planned: usize,
    /// Records actually written.
    pub updated: usize,
    /// Records excluded because they changed between read and commit.
    pub skipped: Vec<String>,
    pub chunks_committed: usize,
    /// Planned values that collide with an `order` already present on another record.
    pub collisions: usize,
    pub dry_run: bool,
    pub assignments: Vec<PlannedAssignment>,
}

impl BackfillReport {
    /// True when there was nothing to assign.
    pub fn is_noop(&self) -> bool {
        self.planned == 0
    }
}
