//! In-memory store implementation for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::reconciliation::OperationKind;
use crate::traits::*;
use crate::types::*;

/// A call issued against the store, successful or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub kind: OperationKind,
    /// Entity name for creates, entity id otherwise
    pub target: String,
}

#[derive(Debug, Clone)]
struct StoredMember {
    record: MemberRecord,
    expenses: Vec<ExpenseRecord>,
}

#[derive(Debug, Clone, Default)]
struct StoredProject {
    name: Option<String>,
    members: Vec<StoredMember>,
}

impl StoredProject {
    fn member(&self, member_id: &str) -> Option<&StoredMember> {
        self.members
            .iter()
            .find(|m| m.record.id.as_deref() == Some(member_id))
    }

    fn member_mut(&mut self, member_id: &str) -> SplitResult<&mut StoredMember> {
        self.members
            .iter_mut()
            .find(|m| m.record.id.as_deref() == Some(member_id))
            .ok_or_else(|| SplitError::MemberNotFound(member_id.to_string()))
    }

    fn check_involved(&self, expense: &ExpenseRecord) -> SplitResult<()> {
        match expense
            .involved_members
            .iter()
            .find(|id| self.member(id.as_str()).is_none())
        {
            Some(unknown) => Err(SplitError::Validation(format!(
                "involved member '{}' is not part of the project",
                unknown
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    projects: HashMap<String, StoredProject>,
    calls: Vec<StoreCall>,
    failures: Vec<(OperationKind, String)>,
}

impl StoreState {
    /// Log a call and apply any injected failure matching one of `targets`
    fn issue(&mut self, kind: OperationKind, targets: &[&str]) -> SplitResult<()> {
        let target = targets.first().copied().unwrap_or_default();
        self.calls.push(StoreCall {
            kind,
            target: target.to_string(),
        });

        let injected = self
            .failures
            .iter()
            .any(|(k, t)| *k == kind && targets.contains(&t.as_str()));
        if injected {
            Err(SplitError::Storage(format!(
                "injected failure for {} '{}'",
                kind, target
            )))
        } else {
            Ok(())
        }
    }

    fn project(&self, project_id: &str) -> SplitResult<&StoredProject> {
        self.projects
            .get(project_id)
            .ok_or_else(|| SplitError::ProjectNotFound(project_id.to_string()))
    }

    fn project_mut(&mut self, project_id: &str) -> SplitResult<&mut StoredProject> {
        self.projects
            .get_mut(project_id)
            .ok_or_else(|| SplitError::ProjectNotFound(project_id.to_string()))
    }
}

/// In-memory store for tests and offline development.
///
/// Assigns uuid ids on create, records every call in order, and can be
/// told to fail calls of a given kind for a given entity name or id.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    fn read(&self) -> SplitResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| SplitError::Storage("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> SplitResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| SplitError::Storage("memory store lock poisoned".to_string()))
    }

    /// Load an already persisted project, replacing any previous copy
    pub fn seed(&self, project: &Project) -> SplitResult<()> {
        let mut members = Vec::with_capacity(project.members.len());
        for member in &project.members {
            member.id.require_persisted()?;
            let expenses = member
                .expenses
                .iter()
                .map(|expense| {
                    expense.id.require_persisted()?;
                    ExpenseRecord::from_expense(expense)
                })
                .collect::<SplitResult<Vec<_>>>()?;
            members.push(StoredMember {
                record: MemberRecord::from_member(member),
                expenses,
            });
        }

        self.write()?.projects.insert(
            project.id.clone(),
            StoredProject {
                name: normalize_name(&project.name),
                members,
            },
        );
        Ok(())
    }

    /// Members and expenses as currently stored
    pub fn members(&self, project_id: &str) -> SplitResult<Vec<Member>> {
        let state = self.read()?;
        let project = state.project(project_id)?;
        project
            .members
            .iter()
            .map(|stored| {
                let id = stored
                    .record
                    .id
                    .clone()
                    .ok_or_else(|| SplitError::Storage("member record without id".to_string()))?;
                let expenses = stored
                    .expenses
                    .iter()
                    .map(ExpenseRecord::to_expense)
                    .collect::<SplitResult<Vec<_>>>()?;
                Ok(Member {
                    id: EntityId::Persisted(id),
                    name: stored.record.name.clone(),
                    order: stored.record.order,
                    expenses,
                })
            })
            .collect()
    }

    /// Stored project name
    pub fn project_name(&self, project_id: &str) -> SplitResult<Option<String>> {
        Ok(self.read()?.project(project_id)?.name.clone())
    }

    /// Every call issued so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.read().map(|state| state.calls.clone()).unwrap_or_default()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.write() {
            state.calls.clear();
        }
    }

    /// Fail every `kind` call targeting an entity with this name or id
    pub fn fail_on(&self, kind: OperationKind, target: &str) {
        if let Ok(mut state) = self.write() {
            state.failures.push((kind, target.to_string()));
        }
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.write() {
            state.failures.clear();
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn update_project(&mut self, project: &ProjectRecord) -> SplitResult<()> {
        let mut state = self.write()?;
        state.issue(OperationKind::UpdateProject, &[project.id.as_str()])?;
        state.project_mut(&project.id)?.name = project.name.clone();
        Ok(())
    }

    async fn create_member(
        &mut self,
        project_id: &str,
        member: &MemberRecord,
    ) -> SplitResult<MemberRecord> {
        let mut state = self.write()?;
        state.issue(
            OperationKind::CreateMember,
            &[member.name.as_deref().unwrap_or_default()],
        )?;

        let mut created = member.clone();
        created.id = Some(Uuid::new_v4().to_string());
        state.project_mut(project_id)?.members.push(StoredMember {
            record: created.clone(),
            expenses: Vec::new(),
        });
        Ok(created)
    }

    async fn update_member(&mut self, project_id: &str, member: &MemberRecord) -> SplitResult<()> {
        let member_id = member
            .id
            .as_deref()
            .ok_or_else(|| SplitError::Validation("member update without id".to_string()))?;

        let mut state = self.write()?;
        state.issue(
            OperationKind::UpdateMember,
            &[member_id, member.name.as_deref().unwrap_or_default()],
        )?;

        let stored = state.project_mut(project_id)?.member_mut(member_id)?;
        stored.record.name = member.name.clone();
        stored.record.order = member.order;
        Ok(())
    }

    async fn delete_member(&mut self, project_id: &str, member_id: &str) -> SplitResult<()> {
        let mut state = self.write()?;
        let name = state
            .project(project_id)?
            .member(member_id)
            .and_then(|m| m.record.name.clone())
            .unwrap_or_default();
        state.issue(OperationKind::DeleteMember, &[member_id, name.as_str()])?;

        let project = state.project_mut(project_id)?;
        let before = project.members.len();
        project
            .members
            .retain(|m| m.record.id.as_deref() != Some(member_id));
        if project.members.len() == before {
            return Err(SplitError::MemberNotFound(member_id.to_string()));
        }

        // Link rows to the deleted member go with it
        for expense in project
            .members
            .iter_mut()
            .flat_map(|m| m.expenses.iter_mut())
        {
            expense.involved_members.retain(|id| id.as_str() != member_id);
        }
        Ok(())
    }

    async fn create_expense(
        &mut self,
        project_id: &str,
        member_id: &str,
        expense: &ExpenseRecord,
    ) -> SplitResult<ExpenseRecord> {
        let mut state = self.write()?;
        state.issue(
            OperationKind::CreateExpense,
            &[expense.name.as_deref().unwrap_or_default()],
        )?;

        let project = state.project_mut(project_id)?;
        project.check_involved(expense)?;

        let mut created = expense.clone();
        created.id = Some(Uuid::new_v4().to_string());
        project.member_mut(member_id)?.expenses.push(created.clone());
        Ok(created)
    }

    async fn update_expense(
        &mut self,
        project_id: &str,
        member_id: &str,
        expense: &ExpenseRecord,
    ) -> SplitResult<()> {
        let expense_id = expense
            .id
            .as_deref()
            .ok_or_else(|| SplitError::Validation("expense update without id".to_string()))?;

        let mut state = self.write()?;
        state.issue(
            OperationKind::UpdateExpense,
            &[expense_id, expense.name.as_deref().unwrap_or_default()],
        )?;

        let project = state.project_mut(project_id)?;
        project.check_involved(expense)?;

        let stored = project
            .member_mut(member_id)?
            .expenses
            .iter_mut()
            .find(|e| e.id.as_deref() == Some(expense_id))
            .ok_or_else(|| SplitError::ExpenseNotFound(expense_id.to_string()))?;
        *stored = expense.clone();
        Ok(())
    }

    async fn delete_expense(
        &mut self,
        project_id: &str,
        member_id: &str,
        expense_id: &str,
    ) -> SplitResult<()> {
        let mut state = self.write()?;
        let name = state
            .project(project_id)?
            .member(member_id)
            .and_then(|m| m.expenses.iter().find(|e| e.id.as_deref() == Some(expense_id)))
            .and_then(|e| e.name.clone())
            .unwrap_or_default();
        state.issue(OperationKind::DeleteExpense, &[expense_id, name.as_str()])?;

        let member = state.project_mut(project_id)?.member_mut(member_id)?;
        let before = member.expenses.len();
        member
            .expenses
            .retain(|e| e.id.as_deref() != Some(expense_id));
        if member.expenses.len() == before {
            return Err(SplitError::ExpenseNotFound(expense_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_assigns_ids_and_records_calls() {
        let mut store = MemoryStore::new();
        store
            .seed(&Project::new("p1".to_string(), None))
            .unwrap();

        let record = MemberRecord {
            id: None,
            name: Some("Ana".to_string()),
            order: 0,
        };
        let created = store.create_member("p1", &record).await.unwrap();
        assert!(created.id.is_some());

        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, OperationKind::CreateMember);
        assert_eq!(calls[0].target, "Ana");
        assert_eq!(store.members("p1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let mut store = MemoryStore::new();
        store
            .seed(&Project::new("p1".to_string(), None))
            .unwrap();
        store.fail_on(OperationKind::CreateMember, "Bo");

        let record = MemberRecord {
            id: None,
            name: Some("Bo".to_string()),
            order: 0,
        };
        let result = store.create_member("p1", &record).await;
        assert!(matches!(result, Err(SplitError::Storage(_))));
        assert!(store.members("p1").unwrap().is_empty());

        store.clear_failures();
        assert!(store.create_member("p1", &record).await.is_ok());
    }

    #[tokio::test]
    async fn test_expense_must_reference_known_members() {
        let mut store = MemoryStore::new();
        let project = Project::new("p1".to_string(), None)
            .with_member(Member::new(EntityId::persisted("a"), None, 0));
        store.seed(&project).unwrap();

        let record = ExpenseRecord {
            id: None,
            name: None,
            amount: None,
            order: 0,
            involved_members: vec!["ghost".to_string()],
        };
        let result = store.create_expense("p1", "a", &record).await;
        assert!(matches!(result, Err(SplitError::Validation(_))));
    }

    #[test]
    fn test_seed_rejects_placeholders() {
        let store = MemoryStore::new();
        let project = Project::new("p1".to_string(), None)
            .with_member(Member::placeholder(Some("Ana".to_string()), 0));
        assert!(matches!(
            store.seed(&project),
            Err(SplitError::NotPersisted(_))
        ));
    }
}
