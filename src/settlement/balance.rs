//! Balance aggregation over members and their expenses

use bigdecimal::BigDecimal;
use log::warn;
use std::collections::HashMap;

use crate::types::*;

/// Net balance per member, kept in member collection order.
///
/// Positive means the member is owed money, negative means they owe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Balances {
    entries: Vec<(EntityId, BigDecimal)>,
}

impl Balances {
    /// Balance for one member
    pub fn get(&self, member_id: &EntityId) -> Option<&BigDecimal> {
        self.entries
            .iter()
            .find(|(id, _)| id == member_id)
            .map(|(_, balance)| balance)
    }

    /// Iterate in member collection order
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &BigDecimal)> {
        self.entries.iter().map(|(id, balance)| (id, balance))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all balances; zero up to division residue
    pub fn total(&self) -> BigDecimal {
        self.entries.iter().map(|(_, balance)| balance).sum()
    }

    /// Balances keyed by member id
    pub fn to_map(&self) -> HashMap<EntityId, BigDecimal> {
        self.entries.iter().cloned().collect()
    }

    pub(crate) fn into_entries(self) -> Vec<(EntityId, BigDecimal)> {
        self.entries
    }
}

/// Aggregate every expense into per-member balances.
///
/// Each charged expense debits its effective involved set evenly and
/// credits the paying member with the full amount. Members are not mutated.
/// An explicit subset with no live members left is split across everyone.
pub fn compute_balances(members: &[Member]) -> Balances {
    let mut balances = vec![BigDecimal::from(0); members.len()];

    for (payer, member) in members.iter().enumerate() {
        for expense in &member.expenses {
            let Some(amount) = expense.charged_amount() else {
                continue;
            };

            let mut sharers: Vec<usize> = members
                .iter()
                .enumerate()
                .filter(|(_, m)| expense.involved_members.includes(&m.id))
                .map(|(idx, _)| idx)
                .collect();

            if sharers.is_empty() {
                warn!(
                    "Expense '{}' of {} involves no current member, splitting across everyone",
                    expense.label(),
                    member.label()
                );
                sharers = (0..members.len()).collect();
            }

            let share = amount.clone() / BigDecimal::from(sharers.len() as u64);
            for idx in sharers {
                balances[idx] -= &share;
            }
            balances[payer] += amount;
        }
    }

    Balances {
        entries: members
            .iter()
            .map(|m| m.id.clone())
            .zip(balances)
            .collect(),
    }
}
