//! Diff-and-apply pass replaying local edits against a store

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::reconciliation::change::{expense_changed, member_changed};
use crate::reconciliation::report::*;
use crate::traits::*;
use crate::types::*;

/// Knobs for a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Skip every store call but still advance the sync point
    pub demo_mode: bool,
}

impl SyncOptions {
    /// Options for a read-only demo project
    pub fn demo() -> Self {
        Self { demo_mode: true }
    }
}

/// Result of one pass
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    /// The edited members with store-assigned ids swapped in
    pub members: Vec<Member>,
    /// New sync point: only what the store confirmed
    pub snapshot: Vec<Member>,
    pub report: SyncReport,
}

/// Replays the difference between two member snapshots against a store.
///
/// Member creations always finish, ids captured, before any expense is
/// created. Store failures never abort the pass; they are collected in the
/// report and the affected entities stay out of the new snapshot.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    options: SyncOptions,
}

impl Reconciler {
    /// Create a reconciler that talks to the store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reconciler with custom options
    pub fn with_options(options: SyncOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Diff `edited` against `original` and apply the difference to `store`
    pub async fn reconcile<S: ProjectStore + ?Sized>(
        &self,
        project_id: &str,
        original: &[Member],
        edited: &[Member],
        store: &mut S,
    ) -> SyncOutcome {
        if self.options.demo_mode {
            info!("Demo mode, not persisting changes to project {}", project_id);
            return SyncOutcome {
                members: edited.to_vec(),
                snapshot: edited.to_vec(),
                report: SyncReport::demo(),
            };
        }

        info!(
            "Reconciling project {}: {} synced members, {} edited",
            project_id,
            original.len(),
            edited.len()
        );

        let mut pass = Pass::new(project_id, original, edited);
        pass.create_members(store).await;
        pass.update_members(store).await;
        pass.delete_members(store).await;
        pass.upsert_expenses(store).await;
        pass.delete_expenses(store).await;
        pass.finish()
    }
}

fn find_member<'m>(members: &'m [Member], member_id: &EntityId) -> Option<&'m Member> {
    members.iter().find(|m| &m.id == member_id)
}

/// Store call needed to bring `expense` in line, `None` if unchanged
fn upsert_kind(original_member: Option<&Member>, expense: &Expense) -> Option<OperationKind> {
    match original_member.and_then(|m| m.expense(&expense.id)) {
        Some(original) if !expense_changed(original, expense) => None,
        Some(_) => Some(OperationKind::UpdateExpense),
        None => Some(OperationKind::CreateExpense),
    }
}

fn missing_id(kind: OperationKind, label: &str) -> SplitError {
    SplitError::Storage(format!("store returned no id for {} '{}'", kind, label))
}

/// Working state of a single pass
struct Pass<'a> {
    project_id: &'a str,
    original: &'a [Member],
    working: Vec<Member>,
    report: SyncReport,
    /// Placeholder id -> label, for members whose creation failed
    unsaved_members: HashMap<EntityId, String>,
    /// Members whose update failed
    stale_members: HashSet<EntityId>,
    undeleted_members: Vec<Member>,
    /// Expenses whose edited state the store now holds
    confirmed_expenses: HashSet<EntityId>,
    /// (owner, expense) pairs whose delete failed
    undeleted_expenses: Vec<(EntityId, Expense)>,
}

impl<'a> Pass<'a> {
    fn new(project_id: &'a str, original: &'a [Member], edited: &[Member]) -> Self {
        Self {
            project_id,
            original,
            working: edited.to_vec(),
            report: SyncReport::default(),
            unsaved_members: HashMap::new(),
            stale_members: HashSet::new(),
            undeleted_members: Vec::new(),
            confirmed_expenses: HashSet::new(),
            undeleted_expenses: Vec::new(),
        }
    }

    async fn create_members<S: ProjectStore + ?Sized>(&mut self, store: &mut S) {
        for idx in 0..self.working.len() {
            if find_member(self.original, &self.working[idx].id).is_some() {
                continue;
            }

            let label = self.working[idx].label();
            let record = MemberRecord::from_member(&self.working[idx]);
            debug!("Creating member '{}' in project {}", label, self.project_id);

            let created = store
                .create_member(self.project_id, &record)
                .await
                .and_then(|r| r.id.ok_or_else(|| missing_id(OperationKind::CreateMember, &label)));

            match created {
                Ok(new_id) => {
                    let new_id = EntityId::Persisted(new_id);
                    let old_id = std::mem::replace(&mut self.working[idx].id, new_id.clone());
                    for expense in self.working.iter_mut().flat_map(|m| m.expenses.iter_mut()) {
                        expense.involved_members.rewrite(&old_id, &new_id);
                    }
                    self.report
                        .record(OperationKind::CreateMember, label, new_id.to_string());
                }
                Err(err) => {
                    self.unsaved_members
                        .insert(self.working[idx].id.clone(), label.clone());
                    self.report
                        .fail(OperationKind::CreateMember, label, FailureCause::Store(err));
                }
            }
        }
    }

    async fn update_members<S: ProjectStore + ?Sized>(&mut self, store: &mut S) {
        for member in &self.working {
            let Some(original) = find_member(self.original, &member.id) else {
                continue;
            };
            if !member_changed(original, member) {
                continue;
            }

            let label = member.label();
            debug!("Updating member '{}' in project {}", label, self.project_id);
            match store
                .update_member(self.project_id, &MemberRecord::from_member(member))
                .await
            {
                Ok(()) => self
                    .report
                    .record(OperationKind::UpdateMember, label, member.id.to_string()),
                Err(err) => {
                    self.stale_members.insert(member.id.clone());
                    self.report
                        .fail(OperationKind::UpdateMember, label, FailureCause::Store(err));
                }
            }
        }
    }

    async fn delete_members<S: ProjectStore + ?Sized>(&mut self, store: &mut S) {
        for original in self.original {
            if find_member(&self.working, &original.id).is_some() {
                continue;
            }

            let label = original.label();
            debug!("Deleting member '{}' from project {}", label, self.project_id);
            let result = match original.id.require_persisted() {
                Ok(member_id) => store.delete_member(self.project_id, member_id).await,
                Err(err) => Err(err),
            };

            match result {
                Ok(()) => self
                    .report
                    .record(OperationKind::DeleteMember, label, original.id.to_string()),
                Err(err) => {
                    self.undeleted_members.push(original.clone());
                    self.report
                        .fail(OperationKind::DeleteMember, label, FailureCause::Store(err));
                }
            }
        }
    }

    async fn upsert_expenses<S: ProjectStore + ?Sized>(&mut self, store: &mut S) {
        for member in self.working.iter_mut() {
            if let Some(parent) = self.unsaved_members.get(&member.id) {
                for expense in &member.expenses {
                    self.report.fail(
                        OperationKind::CreateExpense,
                        expense.label(),
                        FailureCause::Blocked {
                            parent: parent.clone(),
                        },
                    );
                }
                continue;
            }

            let original_member = find_member(self.original, &member.id);
            let member_id = match member.id.require_persisted() {
                Ok(id) => id.to_string(),
                Err(err) => {
                    for expense in &member.expenses {
                        if let Some(kind) = upsert_kind(original_member, expense) {
                            self.report
                                .fail(kind, expense.label(), FailureCause::Store(err.clone()));
                        }
                    }
                    continue;
                }
            };

            for expense in member.expenses.iter_mut() {
                let Some(kind) = upsert_kind(original_member, expense) else {
                    self.confirmed_expenses.insert(expense.id.clone());
                    continue;
                };
                let label = expense.label();

                let blocked_by = expense
                    .involved_members
                    .member_ids()
                    .iter()
                    .find_map(|id| self.unsaved_members.get(id));
                if let Some(parent) = blocked_by {
                    self.report.fail(
                        kind,
                        label,
                        FailureCause::Blocked {
                            parent: parent.clone(),
                        },
                    );
                    continue;
                }

                let record = match ExpenseRecord::from_expense(expense) {
                    Ok(record) => record,
                    Err(err) => {
                        self.report.fail(kind, label, FailureCause::Store(err));
                        continue;
                    }
                };

                debug!("{} '{}' for member {}", kind, label, member_id);
                let result = if kind == OperationKind::UpdateExpense {
                    store
                        .update_expense(self.project_id, &member_id, &record)
                        .await
                } else {
                    store
                        .create_expense(self.project_id, &member_id, &record)
                        .await
                        .and_then(|r| r.id.ok_or_else(|| missing_id(kind, &label)))
                        .map(|new_id| expense.id = EntityId::Persisted(new_id))
                };

                match result {
                    Ok(()) => {
                        self.confirmed_expenses.insert(expense.id.clone());
                        self.report.record(kind, label, expense.id.to_string());
                    }
                    Err(err) => self.report.fail(kind, label, FailureCause::Store(err)),
                }
            }
        }
    }

    async fn delete_expenses<S: ProjectStore + ?Sized>(&mut self, store: &mut S) {
        for member in &self.working {
            let Some(original_member) = find_member(self.original, &member.id) else {
                continue;
            };
            let Some(member_id) = member.id.as_persisted() else {
                continue;
            };

            for original_expense in &original_member.expenses {
                if member.expense(&original_expense.id).is_some() {
                    continue;
                }

                let label = original_expense.label();
                debug!("Deleting expense '{}' of member {}", label, member_id);
                let result = match original_expense.id.require_persisted() {
                    Ok(expense_id) => {
                        store
                            .delete_expense(self.project_id, member_id, expense_id)
                            .await
                    }
                    Err(err) => Err(err),
                };

                match result {
                    Ok(()) => self.report.record(
                        OperationKind::DeleteExpense,
                        label,
                        original_expense.id.to_string(),
                    ),
                    Err(err) => {
                        self.undeleted_expenses
                            .push((member.id.clone(), original_expense.clone()));
                        self.report
                            .fail(OperationKind::DeleteExpense, label, FailureCause::Store(err));
                    }
                }
            }
        }
    }

    /// Build the new sync point from what the store confirmed
    fn finish(self) -> SyncOutcome {
        let mut snapshot = Vec::with_capacity(self.working.len());

        for member in &self.working {
            if self.unsaved_members.contains_key(&member.id) {
                continue;
            }

            let original = find_member(self.original, &member.id);
            let (name, order) = match original {
                Some(original) if self.stale_members.contains(&member.id) => {
                    (original.name.clone(), original.order)
                }
                _ => (member.name.clone(), member.order),
            };

            let mut expenses: Vec<Expense> = member
                .expenses
                .iter()
                .filter_map(|expense| {
                    if self.confirmed_expenses.contains(&expense.id) {
                        Some(expense.clone())
                    } else {
                        original.and_then(|m| m.expense(&expense.id)).cloned()
                    }
                })
                .collect();
            expenses.extend(
                self.undeleted_expenses
                    .iter()
                    .filter(|(owner, _)| owner == &member.id)
                    .map(|(_, expense)| expense.clone()),
            );

            snapshot.push(Member {
                id: member.id.clone(),
                name,
                order,
                expenses,
            });
        }
        snapshot.extend(self.undeleted_members.iter().cloned());

        info!(
            "Reconciled project {}: {} operations applied, {} failed",
            self.project_id,
            self.report.completed.len(),
            self.report.failures.len()
        );

        SyncOutcome {
            members: self.working,
            snapshot,
            report: self.report,
        }
    }
}
