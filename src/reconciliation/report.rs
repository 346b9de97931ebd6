//! Outcome of a reconciliation pass

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::SplitError;

/// Kind of store mutation issued during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    UpdateProject,
    CreateMember,
    UpdateMember,
    DeleteMember,
    CreateExpense,
    UpdateExpense,
    DeleteExpense,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            OperationKind::UpdateProject => "update project",
            OperationKind::CreateMember => "create member",
            OperationKind::UpdateMember => "update member",
            OperationKind::DeleteMember => "delete member",
            OperationKind::CreateExpense => "create expense",
            OperationKind::UpdateExpense => "update expense",
            OperationKind::DeleteExpense => "delete expense",
        };
        f.write_str(text)
    }
}

/// A store call that succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOperation {
    pub kind: OperationKind,
    /// Display label of the entity
    pub entity: String,
    /// Store id of the entity after the call
    pub id: String,
}

/// Why an operation did not go through
#[derive(Debug, Clone, PartialEq)]
pub enum FailureCause {
    /// The store (or payload construction) rejected it
    Store(SplitError),
    /// Never issued because a parent entity failed to persist
    Blocked { parent: String },
}

/// A failed or blocked operation, with enough context to retry by hand
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub kind: OperationKind,
    pub entity: String,
    pub cause: FailureCause,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            FailureCause::Store(err) => write!(f, "{} '{}' failed: {}", self.kind, self.entity, err),
            FailureCause::Blocked { parent } => write!(
                f,
                "{} '{}' skipped: '{}' could not be saved",
                self.kind, self.entity, parent
            ),
        }
    }
}

/// Everything a save did and did not manage to persist
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncReport {
    pub completed: Vec<SyncOperation>,
    pub failures: Vec<SyncFailure>,
    /// Set when the pass ran in demo mode and skipped the store entirely
    pub demo: bool,
}

impl SyncReport {
    pub(crate) fn demo() -> Self {
        Self {
            demo: true,
            ..Self::default()
        }
    }

    /// True when no operation failed or was blocked
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Completed operations of one kind
    pub fn completed_of(&self, kind: OperationKind) -> impl Iterator<Item = &SyncOperation> {
        self.completed.iter().filter(move |op| op.kind == kind)
    }

    /// Failures of one kind
    pub fn failures_of(&self, kind: OperationKind) -> impl Iterator<Item = &SyncFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }

    pub(crate) fn record(&mut self, kind: OperationKind, entity: String, id: String) {
        self.completed.push(SyncOperation { kind, entity, id });
    }

    pub(crate) fn fail(&mut self, kind: OperationKind, entity: String, cause: FailureCause) {
        let failure = SyncFailure {
            kind,
            entity,
            cause,
        };
        log::warn!("{}", failure);
        self.failures.push(failure);
    }

    pub(crate) fn merge(&mut self, other: SyncReport) {
        self.completed.extend(other.completed);
        self.failures.extend(other.failures);
        self.demo |= other.demo;
    }
}
