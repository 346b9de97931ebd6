//! Store abstraction and the records exchanged with it

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Project fields sent on rename
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub name: Option<String>,
}

impl ProjectRecord {
    pub fn new(id: String, name: &Option<String>) -> Self {
        Self {
            id,
            name: normalize_name(name),
        }
    }
}

/// Member payload as seen by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// `None` until the store assigns one
    pub id: Option<String>,
    pub name: Option<String>,
    pub order: i32,
}

impl MemberRecord {
    /// Build the wire form of a member; placeholder ids are not sent
    pub fn from_member(member: &Member) -> Self {
        Self {
            id: member.id.as_persisted().map(str::to_string),
            name: normalize_name(&member.name),
            order: member.order,
        }
    }
}

/// Expense payload as seen by the store.
///
/// Involved members travel as plain ids; an empty list means everyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub amount: Option<BigDecimal>,
    pub order: i32,
    pub involved_members: Vec<String>,
}

impl ExpenseRecord {
    /// Build the wire form of an expense.
    ///
    /// Fails if the expense still references a member that has no store id.
    pub fn from_expense(expense: &Expense) -> SplitResult<Self> {
        let involved_members = expense
            .involved_members
            .member_ids()
            .iter()
            .map(|id| id.require_persisted().map(str::to_string))
            .collect::<SplitResult<Vec<_>>>()?;

        Ok(Self {
            id: expense.id.as_persisted().map(str::to_string),
            name: normalize_name(&expense.name),
            amount: expense.amount.clone(),
            order: expense.order,
            involved_members,
        })
    }

    /// Rebuild a local expense from a stored record
    pub fn to_expense(&self) -> SplitResult<Expense> {
        let id = self
            .id
            .clone()
            .ok_or_else(|| SplitError::Storage("expense record without id".to_string()))?;
        let involved_members = if self.involved_members.is_empty() {
            Involvement::All
        } else {
            Involvement::Subset(
                self.involved_members
                    .iter()
                    .map(|id| EntityId::persisted(id.as_str()))
                    .collect(),
            )
        };

        Ok(Expense {
            id: EntityId::Persisted(id),
            name: self.name.clone(),
            amount: self.amount.clone(),
            order: self.order,
            involved_members,
        })
    }
}

/// Empty names are stored as null
pub fn normalize_name(name: &Option<String>) -> Option<String> {
    name.as_ref().filter(|n| !n.is_empty()).cloned()
}

/// Remote store for projects, members and expenses
///
/// Implementations own transport, timeouts and retries; the sync engine only
/// relies on create calls returning the store-assigned id.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Update project-level fields
    async fn update_project(&mut self, project: &ProjectRecord) -> SplitResult<()>;

    /// Create a member; the returned record carries the assigned id
    async fn create_member(
        &mut self,
        project_id: &str,
        member: &MemberRecord,
    ) -> SplitResult<MemberRecord>;

    /// Update a member's name and order
    async fn update_member(&mut self, project_id: &str, member: &MemberRecord) -> SplitResult<()>;

    /// Delete a member together with its expenses
    async fn delete_member(&mut self, project_id: &str, member_id: &str) -> SplitResult<()>;

    /// Create an expense paid by `member_id`; the returned record carries the assigned id
    async fn create_expense(
        &mut self,
        project_id: &str,
        member_id: &str,
        expense: &ExpenseRecord,
    ) -> SplitResult<ExpenseRecord>;

    /// Update an expense
    async fn update_expense(
        &mut self,
        project_id: &str,
        member_id: &str,
        expense: &ExpenseRecord,
    ) -> SplitResult<()>;

    /// Delete an expense
    async fn delete_expense(
        &mut self,
        project_id: &str,
        member_id: &str,
        expense_id: &str,
    ) -> SplitResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_record_sends_ids_only() {
        let expense = Expense::new(
            EntityId::persisted("e1"),
            Some(String::new()),
            Some(BigDecimal::from(12)),
            3,
        )
        .with_involvement(Involvement::Subset(vec![
            EntityId::persisted("a"),
            EntityId::persisted("b"),
        ]));

        let record = ExpenseRecord::from_expense(&expense).unwrap();
        assert_eq!(record.id.as_deref(), Some("e1"));
        assert_eq!(record.name, None);
        assert_eq!(record.involved_members, vec!["a", "b"]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["involved_members"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_expense_record_rejects_placeholder_reference() {
        let expense = Expense::placeholder(0)
            .with_involvement(Involvement::Subset(vec![EntityId::placeholder()]));

        assert!(matches!(
            ExpenseRecord::from_expense(&expense),
            Err(SplitError::NotPersisted(_))
        ));
    }

    #[test]
    fn test_member_record_omits_placeholder_id() {
        let member = Member::placeholder(Some("Ana".to_string()), 0);
        let record = MemberRecord::from_member(&member);
        assert_eq!(record.id, None);
        assert_eq!(record.name.as_deref(), Some("Ana"));
    }
}
