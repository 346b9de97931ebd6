//! Validation utilities

use std::collections::HashSet;

use crate::types::*;

/// Longest accepted member, expense or project name
pub const MAX_NAME_LEN: usize = 100;

/// Validate an optional display name
pub fn validate_name(name: &Option<String>) -> SplitResult<()> {
    match name {
        Some(name) if name.chars().count() > MAX_NAME_LEN => Err(SplitError::Validation(format!(
            "Name cannot exceed {} characters",
            MAX_NAME_LEN
        ))),
        _ => Ok(()),
    }
}

/// Validate a member list loaded from the store.
///
/// Member ids and expense ids must be unique, names bounded, and every
/// explicit involvement must point at a member of the list.
pub fn validate_members(members: &[Member]) -> SplitResult<()> {
    let mut member_ids = HashSet::new();
    for member in members {
        if !member_ids.insert(&member.id) {
            return Err(SplitError::Validation(format!(
                "Member '{}' appears more than once",
                member.id
            )));
        }
        validate_name(&member.name)?;
    }

    let mut expense_ids = HashSet::new();
    for member in members {
        for expense in &member.expenses {
            if !expense_ids.insert(&expense.id) {
                return Err(SplitError::Validation(format!(
                    "Expense '{}' appears more than once",
                    expense.id
                )));
            }
            validate_name(&expense.name)?;

            if let Some(unknown) = expense
                .involved_members
                .member_ids()
                .iter()
                .find(|id| !member_ids.contains(id))
            {
                return Err(SplitError::Validation(format!(
                    "Expense '{}' involves unknown member '{}'",
                    expense.label(),
                    unknown
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_members_pass() {
        let a = EntityId::persisted("a");
        let members = vec![
            Member::new(a.clone(), Some("Ana".to_string()), 0).with_expense(
                Expense::new(EntityId::persisted("e1"), None, None, 0)
                    .with_involvement(Involvement::Subset(vec![a])),
            ),
            Member::new(EntityId::persisted("b"), None, 1),
        ];
        assert!(validate_members(&members).is_ok());
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let members = vec![
            Member::new(EntityId::persisted("a"), None, 0),
            Member::new(EntityId::persisted("a"), None, 1),
        ];
        assert!(matches!(
            validate_members(&members),
            Err(SplitError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_involved_member_rejected() {
        let members = vec![Member::new(EntityId::persisted("a"), None, 0).with_expense(
            Expense::new(EntityId::persisted("e1"), None, None, 0)
                .with_involvement(Involvement::Subset(vec![EntityId::persisted("ghost")])),
        )];
        assert!(validate_members(&members).is_err());
    }

    #[test]
    fn test_long_name_rejected() {
        assert!(validate_name(&Some("x".repeat(MAX_NAME_LEN + 1))).is_err());
        assert!(validate_name(&Some("x".repeat(MAX_NAME_LEN))).is_ok());
        assert!(validate_name(&None).is_ok());
    }
}
