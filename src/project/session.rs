//! Editable project state with an explicit sync point

use bigdecimal::BigDecimal;
use log::debug;

use crate::reconciliation::*;
use crate::settlement::{settle, Settlement};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_members, validate_name};

/// A project being edited locally.
///
/// Holds the working copy the UI mutates freely and the snapshot last
/// confirmed by the store. `save` takes `&mut self`, so two saves of the
/// same session can never interleave.
#[derive(Debug, Clone)]
pub struct ProjectSession {
    project: Project,
    original_name: Option<String>,
    original_members: Vec<Member>,
    options: SyncOptions,
}

impl ProjectSession {
    /// Start editing a project loaded from the store
    pub fn new(project: Project) -> Self {
        Self::with_options(project, SyncOptions::default())
    }

    /// Start editing with custom sync options
    pub fn with_options(project: Project, options: SyncOptions) -> Self {
        Self {
            original_name: project.name.clone(),
            original_members: project.members.clone(),
            project,
            options,
        }
    }

    /// Validate a loaded project before editing it
    pub fn open(project: Project, options: SyncOptions) -> SplitResult<Self> {
        validate_name(&project.name)?;
        validate_members(&project.members)?;
        Ok(Self::with_options(project, options))
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Working copy of the members
    pub fn members(&self) -> &[Member] {
        &self.project.members
    }

    /// Members as last confirmed by the store
    pub fn original_members(&self) -> &[Member] {
        &self.original_members
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn rename_project(&mut self, name: Option<String>) {
        self.project.name = name;
    }

    /// Add a member with a placeholder id at the end of the list
    pub fn add_member(&mut self, name: Option<String>) -> EntityId {
        let member = Member::placeholder(name, self.project.members.len() as i32);
        let id = member.id.clone();
        self.project.members.push(member);
        id
    }

    pub fn rename_member(&mut self, member_id: &EntityId, name: Option<String>) -> SplitResult<()> {
        self.member_mut(member_id)?.name = name;
        Ok(())
    }

    /// Move a member to `index`, renumbering every member's order
    pub fn move_member(&mut self, member_id: &EntityId, index: usize) -> SplitResult<()> {
        let pos = self.member_position(member_id)?;
        let member = self.project.members.remove(pos);
        let index = index.min(self.project.members.len());
        self.project.members.insert(index, member);
        renumber_members(&mut self.project.members);
        Ok(())
    }

    /// Remove a member and its expenses, dropping it from other expenses' involvement.
    ///
    /// Other selections are left as chosen, so members added later are not
    /// charged for subset expenses.
    pub fn remove_member(&mut self, member_id: &EntityId) -> SplitResult<Member> {
        let pos = self.member_position(member_id)?;
        let removed = self.project.members.remove(pos);
        renumber_members(&mut self.project.members);

        for expense in self
            .project
            .members
            .iter_mut()
            .flat_map(|m| m.expenses.iter_mut())
        {
            expense.involved_members.remove(member_id);
        }
        Ok(removed)
    }

    /// Add a blank expense shared by everyone
    pub fn add_expense(&mut self, member_id: &EntityId) -> SplitResult<EntityId> {
        let member = self.member_mut(member_id)?;
        let expense = Expense::placeholder(member.expenses.len() as i32);
        let id = expense.id.clone();
        member.expenses.push(expense);
        Ok(id)
    }

    /// Replace an expense by id, keeping its position
    pub fn update_expense(&mut self, member_id: &EntityId, expense: Expense) -> SplitResult<()> {
        let all_ids = self.project.member_ids();
        let member = self.member_mut(member_id)?;
        let slot = member
            .expense_mut(&expense.id)
            .ok_or_else(|| SplitError::ExpenseNotFound(expense.id.to_string()))?;
        *slot = expense;
        slot.involved_members.retain_existing(&all_ids);
        renumber_expenses(&mut member.expenses);
        Ok(())
    }

    /// Set or clear the amount of an expense
    pub fn set_expense_amount(
        &mut self,
        member_id: &EntityId,
        expense_id: &EntityId,
        amount: Option<BigDecimal>,
    ) -> SplitResult<()> {
        self.expense_mut(member_id, expense_id)?.amount = amount;
        Ok(())
    }

    pub fn remove_expense(
        &mut self,
        member_id: &EntityId,
        expense_id: &EntityId,
    ) -> SplitResult<Expense> {
        let member = self.member_mut(member_id)?;
        let pos = member
            .expenses
            .iter()
            .position(|e| &e.id == expense_id)
            .ok_or_else(|| SplitError::ExpenseNotFound(expense_id.to_string()))?;
        let removed = member.expenses.remove(pos);
        renumber_expenses(&mut member.expenses);
        Ok(removed)
    }

    /// Flip whether `involved_id` shares an expense
    pub fn toggle_involved(
        &mut self,
        member_id: &EntityId,
        expense_id: &EntityId,
        involved_id: &EntityId,
    ) -> SplitResult<()> {
        self.member_position(involved_id)?;
        let all_ids = self.project.member_ids();
        self.expense_mut(member_id, expense_id)?
            .involved_members
            .toggle(involved_id, &all_ids);
        Ok(())
    }

    /// What differs from the last sync point
    pub fn changes(&self) -> ChangeSet {
        detect_changes(
            &self.original_name,
            &self.project.name,
            &self.original_members,
            &self.project.members,
        )
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.changes().any()
    }

    /// Balances and payments for the working copy
    pub fn settlement(&self) -> Settlement {
        settle(&self.project.members)
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.settlement().payments
    }

    /// Persist local edits and advance the sync point to what the store accepted
    pub async fn save<S: ProjectStore + ?Sized>(&mut self, store: &mut S) -> SyncReport {
        let changes = self.changes();
        if !changes.any() {
            debug!("Project {} has no unsaved changes", self.project.id);
            return SyncReport::default();
        }

        let mut report = SyncReport {
            demo: self.options.demo_mode,
            ..SyncReport::default()
        };

        if changes.project_name_changed {
            self.save_name(store, &mut report).await;
        }

        if changes.members_changed {
            let outcome = Reconciler::with_options(self.options.clone())
                .reconcile(
                    &self.project.id,
                    &self.original_members,
                    &self.project.members,
                    store,
                )
                .await;
            self.project.members = outcome.members;
            self.original_members = outcome.snapshot;
            report.merge(outcome.report);
        }

        report
    }

    async fn save_name<S: ProjectStore + ?Sized>(&mut self, store: &mut S, report: &mut SyncReport) {
        if self.options.demo_mode {
            self.original_name = self.project.name.clone();
            return;
        }

        let label = self
            .project
            .name
            .clone()
            .unwrap_or_else(|| self.project.id.clone());
        let record = ProjectRecord::new(self.project.id.clone(), &self.project.name);
        match store.update_project(&record).await {
            Ok(()) => {
                self.original_name = self.project.name.clone();
                self.project.updated_at = chrono::Utc::now().naive_utc();
                report.record(OperationKind::UpdateProject, label, self.project.id.clone());
            }
            Err(err) => report.fail(OperationKind::UpdateProject, label, FailureCause::Store(err)),
        }
    }

    fn member_position(&self, member_id: &EntityId) -> SplitResult<usize> {
        self.project
            .members
            .iter()
            .position(|m| &m.id == member_id)
            .ok_or_else(|| SplitError::MemberNotFound(member_id.to_string()))
    }

    fn member_mut(&mut self, member_id: &EntityId) -> SplitResult<&mut Member> {
        self.project
            .member_mut(member_id)
            .ok_or_else(|| SplitError::MemberNotFound(member_id.to_string()))
    }

    fn expense_mut(
        &mut self,
        member_id: &EntityId,
        expense_id: &EntityId,
    ) -> SplitResult<&mut Expense> {
        self.member_mut(member_id)?
            .expense_mut(expense_id)
            .ok_or_else(|| SplitError::ExpenseNotFound(expense_id.to_string()))
    }
}

fn renumber_members(members: &mut [Member]) {
    for (index, member) in members.iter_mut().enumerate() {
        member.order = index as i32;
    }
}

fn renumber_expenses(expenses: &mut [Expense]) {
    for (index, expense) in expenses.iter_mut().enumerate() {
        expense.order = index as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ProjectSession {
        let project = Project::new("p1".to_string(), Some("Trip".to_string()))
            .with_member(Member::new(EntityId::persisted("a"), Some("Ana".to_string()), 0))
            .with_member(Member::new(EntityId::persisted("b"), Some("Bo".to_string()), 1))
            .with_member(Member::new(EntityId::persisted("c"), Some("Cy".to_string()), 2));
        ProjectSession::new(project)
    }

    #[test]
    fn test_fresh_session_is_clean() {
        let session = session();
        assert!(!session.has_unsaved_changes());
        assert!(session.payments().is_empty());
    }

    #[test]
    fn test_add_member_uses_placeholder() {
        let mut session = session();
        let id = session.add_member(Some("Di".to_string()));

        assert!(!id.is_persisted());
        assert_eq!(session.members()[3].order, 3);
        assert!(session.changes().members_changed);
    }

    #[test]
    fn test_toggle_collapses_back_to_all() {
        let mut session = session();
        let a = EntityId::persisted("a");
        let b = EntityId::persisted("b");
        let expense_id = session.add_expense(&a).unwrap();

        session.toggle_involved(&a, &expense_id, &b).unwrap();
        let involved = &session.members()[0].expenses[0].involved_members;
        assert_eq!(involved.member_ids().len(), 2);
        assert!(!involved.includes(&b));

        session.toggle_involved(&a, &expense_id, &b).unwrap();
        assert!(session.members()[0].expenses[0].involved_members.is_all());
    }

    #[test]
    fn test_remove_member_prunes_involvement() {
        let mut session = session();
        let a = EntityId::persisted("a");
        let b = EntityId::persisted("b");
        let c = EntityId::persisted("c");
        let expense_id = session.add_expense(&a).unwrap();
        session.toggle_involved(&a, &expense_id, &c).unwrap();

        session.remove_member(&c).unwrap();

        assert_eq!(
            session.members()[0].expenses[0].involved_members,
            Involvement::Subset(vec![a.clone(), b.clone()])
        );
        assert_eq!(session.members()[1].id, b);
        assert_eq!(session.members()[1].order, 1);
    }

    #[test]
    fn test_member_added_after_removal_owes_nothing_for_old_subset() {
        let mut session = session();
        let a = EntityId::persisted("a");
        let c = EntityId::persisted("c");
        let expense_id = session.add_expense(&a).unwrap();
        session.toggle_involved(&a, &expense_id, &c).unwrap();
        session
            .set_expense_amount(&a, &expense_id, Some(BigDecimal::from(30)))
            .unwrap();

        session.remove_member(&c).unwrap();
        let di = session.add_member(Some("Di".to_string()));

        let settlement = session.settlement();
        assert_eq!(settlement.balances.get(&di), Some(&BigDecimal::from(0)));
        assert_eq!(settlement.balances.get(&a), Some(&BigDecimal::from(15)));
    }

    #[test]
    fn test_remove_last_selected_member_falls_back_to_all() {
        let mut session = session();
        let a = EntityId::persisted("a");
        let b = EntityId::persisted("b");
        let c = EntityId::persisted("c");
        let expense_id = session.add_expense(&a).unwrap();
        session.toggle_involved(&a, &expense_id, &a).unwrap();
        session.toggle_involved(&a, &expense_id, &b).unwrap();

        session.remove_member(&c).unwrap();

        assert!(session.members()[0].expenses[0].involved_members.is_all());
    }

    #[test]
    fn test_move_member_renumbers() {
        let mut session = session();
        session.move_member(&EntityId::persisted("c"), 0).unwrap();

        let order: Vec<(String, i32)> = session
            .members()
            .iter()
            .map(|m| (m.id.to_string(), m.order))
            .collect();
        assert_eq!(
            order,
            vec![
                ("c".to_string(), 0),
                ("a".to_string(), 1),
                ("b".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_settlement_follows_edits() {
        let mut session = session();
        let a = EntityId::persisted("a");
        let expense_id = session.add_expense(&a).unwrap();
        session
            .set_expense_amount(&a, &expense_id, Some(BigDecimal::from(30)))
            .unwrap();

        let payments = session.payments();
        assert_eq!(payments.len(), 2);
        assert!(payments.iter().all(|p| p.to_member == a));
    }

    #[test]
    fn test_unknown_ids_are_errors() {
        let mut session = session();
        let ghost = EntityId::persisted("ghost");

        assert!(matches!(
            session.rename_member(&ghost, None),
            Err(SplitError::MemberNotFound(_))
        ));
        assert!(matches!(
            session.remove_expense(&EntityId::persisted("a"), &ghost),
            Err(SplitError::ExpenseNotFound(_))
        ));
    }

    #[test]
    fn test_open_validates() {
        let project = Project::new("p1".to_string(), None)
            .with_member(Member::new(EntityId::persisted("a"), None, 0))
            .with_member(Member::new(EntityId::persisted("a"), None, 1));
        assert!(ProjectSession::open(project, SyncOptions::default()).is_err());
    }
}
