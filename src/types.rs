//! Core types and data structures for shared-expense tabs

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Identity of a member or expense.
///
/// Entities created locally carry a `Local` placeholder until the store
/// assigns them a durable id on first persistence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityId {
    /// Client-generated placeholder, never sent to the store
    Local(Uuid),
    /// Identifier assigned by the store
    Persisted(String),
}

impl EntityId {
    /// Mint a fresh placeholder id
    pub fn placeholder() -> Self {
        EntityId::Local(Uuid::new_v4())
    }

    /// Wrap a store-assigned id
    pub fn persisted(id: impl Into<String>) -> Self {
        EntityId::Persisted(id.into())
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, EntityId::Persisted(_))
    }

    /// The store id, if this entity has been persisted
    pub fn as_persisted(&self) -> Option<&str> {
        match self {
            EntityId::Persisted(id) => Some(id),
            EntityId::Local(_) => None,
        }
    }

    /// The store id, or an error for placeholders
    pub fn require_persisted(&self) -> SplitResult<&str> {
        self.as_persisted()
            .ok_or_else(|| SplitError::NotPersisted(self.to_string()))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Local(uuid) => write!(f, "local:{}", uuid),
            EntityId::Persisted(id) => f.write_str(id),
        }
    }
}

/// Which members share the cost of an expense.
///
/// `All` is the compact form for "every member of the project", so an
/// expense keeps covering everyone when the member list later grows.
/// On the wire it is an empty id list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Involvement {
    #[default]
    All,
    /// Explicit, non-empty subset that does not cover every member
    Subset(Vec<EntityId>),
}

impl Involvement {
    /// Build an involvement from selected ids, collapsing to `All` when the
    /// selection is empty or covers every member in `all_ids`.
    pub fn from_ids(ids: Vec<EntityId>, all_ids: &[EntityId]) -> Self {
        let mut selected: Vec<EntityId> = Vec::with_capacity(ids.len());
        for id in ids {
            if all_ids.contains(&id) && !selected.contains(&id) {
                selected.push(id);
            }
        }

        if selected.is_empty() || all_ids.iter().all(|id| selected.contains(id)) {
            Involvement::All
        } else {
            Involvement::Subset(selected)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Involvement::All)
    }

    /// Explicitly listed ids (empty for `All`)
    pub fn member_ids(&self) -> &[EntityId] {
        match self {
            Involvement::All => &[],
            Involvement::Subset(ids) => ids,
        }
    }

    /// Whether the given member shares this expense
    pub fn includes(&self, member_id: &EntityId) -> bool {
        match self {
            Involvement::All => true,
            Involvement::Subset(ids) => ids.contains(member_id),
        }
    }

    /// Resolve against the live member list, in collection order.
    ///
    /// References to members that no longer exist are skipped.
    pub fn effective<'a>(&self, members: &'a [Member]) -> Vec<&'a Member> {
        members.iter().filter(|m| self.includes(&m.id)).collect()
    }

    /// Flip one member's participation.
    ///
    /// Deselecting from `All` expands to everyone else; a selection that ends
    /// up covering every member collapses back to `All`.
    pub fn toggle(&mut self, member_id: &EntityId, all_ids: &[EntityId]) {
        let selected = match self {
            Involvement::All => all_ids
                .iter()
                .filter(|id| *id != member_id)
                .cloned()
                .collect(),
            Involvement::Subset(ids) => {
                let mut ids = ids.clone();
                if let Some(pos) = ids.iter().position(|id| id == member_id) {
                    ids.remove(pos);
                } else {
                    ids.push(member_id.clone());
                }
                ids
            }
        };
        *self = Involvement::from_ids(selected, all_ids);
    }

    /// Drop references to members missing from `all_ids`
    pub fn retain_existing(&mut self, all_ids: &[EntityId]) {
        if let Involvement::Subset(ids) = self {
            *self = Involvement::from_ids(std::mem::take(ids), all_ids);
        }
    }

    /// Drop a deleted member from an explicit subset.
    ///
    /// The rest of the selection is kept as is, even when it now covers every
    /// remaining member; only an emptied subset falls back to `All`.
    pub fn remove(&mut self, member_id: &EntityId) {
        if let Involvement::Subset(ids) = self {
            ids.retain(|id| id != member_id);
            if ids.is_empty() {
                *self = Involvement::All;
            }
        }
    }

    /// Replace every reference to `from` with `to`
    pub fn rewrite(&mut self, from: &EntityId, to: &EntityId) {
        if let Involvement::Subset(ids) = self {
            for id in ids.iter_mut().filter(|id| *id == from) {
                *id = to.clone();
            }
        }
    }

    /// Compare as identity sets, ignoring listing order
    pub fn same_set(&self, other: &Involvement) -> bool {
        match (self, other) {
            (Involvement::All, Involvement::All) => true,
            (Involvement::Subset(a), Involvement::Subset(b)) => {
                a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
            }
            _ => false,
        }
    }
}

impl Serialize for Involvement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.member_ids())
    }
}

impl<'de> Deserialize<'de> for Involvement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ids = Vec::<EntityId>::deserialize(deserializer)?;
        if ids.is_empty() {
            Ok(Involvement::All)
        } else {
            Ok(Involvement::Subset(ids))
        }
    }
}

/// A single expense paid by its owning member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: EntityId,
    pub name: Option<String>,
    /// Amount paid; `None` counts as zero
    pub amount: Option<BigDecimal>,
    /// Display order within the owning member
    pub order: i32,
    pub involved_members: Involvement,
}

impl Expense {
    /// Create a new expense shared by all members
    pub fn new(id: EntityId, name: Option<String>, amount: Option<BigDecimal>, order: i32) -> Self {
        Self {
            id,
            name,
            amount,
            order,
            involved_members: Involvement::All,
        }
    }

    /// A blank, locally created expense
    pub fn placeholder(order: i32) -> Self {
        Self::new(EntityId::placeholder(), None, None, order)
    }

    /// Set who shares this expense
    pub fn with_involvement(mut self, involved_members: Involvement) -> Self {
        self.involved_members = involved_members;
        self
    }

    /// The amount to settle, if it is present and non-zero
    pub fn charged_amount(&self) -> Option<&BigDecimal> {
        self.amount
            .as_ref()
            .filter(|amount| **amount != BigDecimal::from(0))
    }

    /// Human-readable label for reports
    pub fn label(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("expense {}", self.id),
        }
    }
}

/// A participant in a project, owning the expenses they paid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: EntityId,
    pub name: Option<String>,
    /// Display and iteration order
    pub order: i32,
    pub expenses: Vec<Expense>,
}

impl Member {
    /// Create a new member without expenses
    pub fn new(id: EntityId, name: Option<String>, order: i32) -> Self {
        Self {
            id,
            name,
            order,
            expenses: Vec::new(),
        }
    }

    /// A locally created member awaiting persistence
    pub fn placeholder(name: Option<String>, order: i32) -> Self {
        Self::new(EntityId::placeholder(), name, order)
    }

    /// Append an expense
    pub fn with_expense(mut self, expense: Expense) -> Self {
        self.expenses.push(expense);
        self
    }

    pub fn expense(&self, expense_id: &EntityId) -> Option<&Expense> {
        self.expenses.iter().find(|e| &e.id == expense_id)
    }

    pub fn expense_mut(&mut self, expense_id: &EntityId) -> Option<&mut Expense> {
        self.expenses.iter_mut().find(|e| &e.id == expense_id)
    }

    /// Human-readable label for reports
    pub fn label(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("member {}", self.id),
        }
    }
}

/// A directed transfer settling part of a debt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub from_member: EntityId,
    pub to_member: EntityId,
    /// Positive amount, rounded to 2 decimal places
    pub amount: BigDecimal,
}

impl Payment {
    /// Render with member names resolved from `members`
    pub fn describe(&self, members: &[Member]) -> String {
        let label = |id: &EntityId| {
            members
                .iter()
                .find(|m| &m.id == id)
                .map(Member::label)
                .unwrap_or_else(|| id.to_string())
        };
        format!(
            "{} -> {}: {}",
            label(&self.from_member),
            label(&self.to_member),
            self.amount
        )
    }
}

/// A group tab holding its members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub members: Vec<Member>,
}

impl Project {
    /// Create an empty project
    pub fn new(id: String, name: Option<String>) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            name,
            created_at: now,
            updated_at: now,
            members: Vec::new(),
        }
    }

    /// Append a member
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn member(&self, member_id: &EntityId) -> Option<&Member> {
        self.members.iter().find(|m| &m.id == member_id)
    }

    pub fn member_mut(&mut self, member_id: &EntityId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| &m.id == member_id)
    }

    /// Ids of all members, in collection order
    pub fn member_ids(&self) -> Vec<EntityId> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }
}

/// Errors that can occur while editing or syncing a project
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplitError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Project not found: {0}")]
    ProjectNotFound(String),
    #[error("Member not found: {0}")]
    MemberNotFound(String),
    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Entity has not been persisted yet: {0}")]
    NotPersisted(String),
}

/// Result type for tab operations
pub type SplitResult<T> = Result<T, SplitError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<EntityId> {
        (0..n).map(|i| EntityId::persisted(format!("m{}", i))).collect()
    }

    #[test]
    fn test_involvement_collapses_full_selection() {
        let all = ids(3);
        assert_eq!(Involvement::from_ids(all.clone(), &all), Involvement::All);
        assert_eq!(Involvement::from_ids(vec![], &all), Involvement::All);

        let subset = Involvement::from_ids(vec![all[0].clone(), all[2].clone()], &all);
        assert_eq!(
            subset,
            Involvement::Subset(vec![all[0].clone(), all[2].clone()])
        );
    }

    #[test]
    fn test_toggle_from_all_and_back() {
        let all = ids(3);
        let mut involvement = Involvement::All;

        involvement.toggle(&all[1], &all);
        assert_eq!(
            involvement,
            Involvement::Subset(vec![all[0].clone(), all[2].clone()])
        );

        involvement.toggle(&all[1], &all);
        assert!(involvement.is_all());
    }

    #[test]
    fn test_toggle_last_selected_member_falls_back_to_all() {
        let all = ids(2);
        let mut involvement = Involvement::Subset(vec![all[0].clone()]);

        involvement.toggle(&all[0], &all);
        assert!(involvement.is_all());
    }

    #[test]
    fn test_retain_existing_and_rewrite() {
        let all = ids(3);
        let placeholder = EntityId::placeholder();
        let mut involvement = Involvement::Subset(vec![all[0].clone(), placeholder.clone()]);

        let fresh = EntityId::persisted("fresh");
        involvement.rewrite(&placeholder, &fresh);
        assert_eq!(involvement.member_ids(), &[all[0].clone(), fresh.clone()]);

        involvement.retain_existing(&all);
        assert_eq!(involvement, Involvement::Subset(vec![all[0].clone()]));
    }

    #[test]
    fn test_remove_keeps_remaining_subset() {
        let all = ids(3);
        let mut involvement = Involvement::Subset(vec![all[0].clone(), all[1].clone()]);

        involvement.remove(&all[2]);
        assert_eq!(
            involvement,
            Involvement::Subset(vec![all[0].clone(), all[1].clone()])
        );

        involvement.remove(&all[1]);
        assert_eq!(involvement, Involvement::Subset(vec![all[0].clone()]));

        involvement.remove(&all[0]);
        assert!(involvement.is_all());
    }

    #[test]
    fn test_same_set_ignores_order() {
        let all = ids(3);
        let a = Involvement::Subset(vec![all[0].clone(), all[1].clone()]);
        let b = Involvement::Subset(vec![all[1].clone(), all[0].clone()]);
        assert!(a.same_set(&b));
        assert!(!a.same_set(&Involvement::All));
    }

    #[test]
    fn test_involvement_wire_encoding() {
        let all = serde_json::to_string(&Involvement::All).unwrap();
        assert_eq!(all, "[]");

        let decoded: Involvement = serde_json::from_str("[]").unwrap();
        assert!(decoded.is_all());

        let subset = Involvement::Subset(vec![EntityId::persisted("a")]);
        let json = serde_json::to_string(&subset).unwrap();
        let decoded: Involvement = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, subset);
    }

    #[test]
    fn test_charged_amount_skips_null_and_zero() {
        let mut expense = Expense::placeholder(0);
        assert!(expense.charged_amount().is_none());

        expense.amount = Some(BigDecimal::from(0));
        assert!(expense.charged_amount().is_none());

        expense.amount = Some(BigDecimal::from(-5));
        assert_eq!(expense.charged_amount(), Some(&BigDecimal::from(-5)));
    }

    #[test]
    fn test_require_persisted() {
        assert_eq!(EntityId::persisted("abc").require_persisted(), Ok("abc"));
        assert!(matches!(
            EntityId::placeholder().require_persisted(),
            Err(SplitError::NotPersisted(_))
        ));
    }
}
