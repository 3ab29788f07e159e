//! Core types for the reconciler.

use std::fmt;

use autoscaler_core::ObjectKey;
use itertools::Itertools;

/// What a single converge step did to one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Created,
    Updated,
    Unchanged,
    Deleted,
    /// Deletion was requested but the object was already gone.
    Absent,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
            Self::Absent => "absent",
        };
        write!(f, "{s}")
    }
}

/// Result of converging one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub key: ObjectKey,
    pub operation: SyncOperation,
}

impl SyncOutcome {
    pub const fn new(key: ObjectKey, operation: SyncOperation) -> Self {
        Self { key, operation }
    }

    /// The write this outcome performed, if any.
    pub fn action(&self) -> Option<ReconcileAction> {
        match self.operation {
            SyncOperation::Created => Some(ReconcileAction::Create {
                key: self.key.clone(),
            }),
            SyncOperation::Updated => Some(ReconcileAction::Update {
                key: self.key.clone(),
            }),
            SyncOperation::Deleted => Some(ReconcileAction::Delete {
                key: self.key.clone(),
            }),
            SyncOperation::Unchanged | SyncOperation::Absent => None,
        }
    }
}

/// A write performed against the store during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    Create { key: ObjectKey },
    Update { key: ObjectKey },
    Delete { key: ObjectKey },
}

impl ReconcileAction {
    /// Get the key this action targets.
    pub const fn key(&self) -> &ObjectKey {
        match self {
            Self::Create { key } | Self::Update { key } | Self::Delete { key } => key,
        }
    }

    /// Get a description of the action.
    pub fn description(&self) -> String {
        match self {
            Self::Create { key } => format!("create {key}"),
            Self::Update { key } => format!("update {key}"),
            Self::Delete { key } => format!("delete {key}"),
        }
    }
}

/// Result of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Writes that were performed.
    pub actions_taken: Vec<ReconcileAction>,
    /// Auxiliary objects that failed to converge.
    pub actions_failed: Vec<(ObjectKey, String)>,
    /// Non-fatal findings, e.g. malformed GPU labels.
    pub warnings: Vec<String>,
}

impl ReconcileOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, action: ReconcileAction) {
        self.actions_taken.push(action);
    }

    pub fn record_sync(&mut self, outcome: &SyncOutcome) {
        if let Some(action) = outcome.action() {
            self.record(action);
        }
    }

    pub fn record_failure(&mut self, key: ObjectKey, reason: impl Into<String>) {
        self.actions_failed.push((key, reason.into()));
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Nothing was written and nothing failed.
    pub fn converged(&self) -> bool {
        self.actions_taken.is_empty() && self.actions_failed.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.actions_failed.is_empty()
    }

    pub fn writes(&self) -> usize {
        self.actions_taken.len()
    }

    /// Count of actions of each kind: (creates, updates, deletes).
    pub fn counts(&self) -> (usize, usize, usize) {
        let counts = self.actions_taken.iter().counts_by(|a| match a {
            ReconcileAction::Create { .. } => 0,
            ReconcileAction::Update { .. } => 1,
            ReconcileAction::Delete { .. } => 2,
        });
        (
            counts.get(&0).copied().unwrap_or(0),
            counts.get(&1).copied().unwrap_or(0),
            counts.get(&2).copied().unwrap_or(0),
        )
    }

    pub fn summary(&self) -> String {
        self.actions_taken
            .iter()
            .map(ReconcileAction::description)
            .join(", ")
    }
}
