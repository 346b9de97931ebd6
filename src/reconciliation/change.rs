//! Change detection between the synced snapshot and the working copy

use serde::{Deserialize, Serialize};

use crate::types::*;

/// What differs between the last sync point and local edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub project_name_changed: bool,
    pub members_changed: bool,
}

impl ChangeSet {
    /// Whether anything needs saving
    pub fn any(&self) -> bool {
        self.project_name_changed || self.members_changed
    }
}

/// Compare the synced project name and members against the edited ones
pub fn detect_changes(
    original_name: &Option<String>,
    edited_name: &Option<String>,
    original_members: &[Member],
    edited_members: &[Member],
) -> ChangeSet {
    ChangeSet {
        project_name_changed: original_name != edited_name,
        members_changed: original_members != edited_members,
    }
}

/// Member fields the store tracks on update
pub fn member_changed(original: &Member, edited: &Member) -> bool {
    original.name != edited.name || original.order != edited.order
}

/// Expense fields the store tracks on update
pub fn expense_changed(original: &Expense, edited: &Expense) -> bool {
    original.amount != edited.amount
        || original.name != edited.name
        || original.order != edited.order
        || !original.involved_members.same_set(&edited.involved_members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn expense() -> Expense {
        Expense::new(
            EntityId::persisted("e1"),
            Some("Dinner".to_string()),
            Some(BigDecimal::from(30)),
            0,
        )
    }

    #[test]
    fn test_unchanged_snapshot_is_clean() {
        let members = vec![Member::new(EntityId::persisted("a"), None, 0).with_expense(expense())];
        let name = Some("Trip".to_string());

        let changes = detect_changes(&name, &name, &members, &members.clone());
        assert!(!changes.any());
    }

    #[test]
    fn test_name_and_member_changes_are_separate() {
        let members = vec![Member::new(EntityId::persisted("a"), None, 0)];
        let mut edited = members.clone();
        edited[0].name = Some("Ana".to_string());

        let changes = detect_changes(&None, &None, &members, &edited);
        assert!(changes.members_changed);
        assert!(!changes.project_name_changed);

        let changes = detect_changes(&None, &Some("Trip".to_string()), &members, &members);
        assert!(changes.project_name_changed);
        assert!(!changes.members_changed);
    }

    #[test]
    fn test_expense_changed_fields() {
        let original = expense();
        assert!(!expense_changed(&original, &original.clone()));

        let mut edited = original.clone();
        edited.amount = None;
        assert!(expense_changed(&original, &edited));

        let mut edited = original.clone();
        edited.involved_members = Involvement::Subset(vec![EntityId::persisted("a")]);
        assert!(expense_changed(&original, &edited));
    }

    #[test]
    fn test_member_changed_ignores_expenses() {
        let original = Member::new(EntityId::persisted("a"), Some("Ana".to_string()), 0);
        let edited = original.clone().with_expense(expense());
        assert!(!member_changed(&original, &edited));

        let mut reordered = original.clone();
        reordered.order = 2;
        assert!(member_changed(&original, &reordered));
    }
}
