//! Pairwise settlement of member balances

use bigdecimal::{BigDecimal, RoundingMode};
use log::debug;

use crate::settlement::balance::{compute_balances, Balances};
use crate::types::*;

/// Number of decimal places kept on emitted payments
pub const PAYMENT_SCALE: i64 = 2;

/// Balances together with the payments that clear them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settlement {
    pub balances: Balances,
    pub payments: Vec<Payment>,
}

/// Compute balances and settle them.
///
/// Debtors are visited in member order and each one pays creditors in member
/// order until its deficit is gone. This greedy walk does not minimise the
/// number of transfers; its ordering is part of the contract.
pub fn settle(members: &[Member]) -> Settlement {
    let balances = compute_balances(members);
    let payments = pairwise_payments(balances.clone());
    Settlement { balances, payments }
}

/// Transfers settling every debt among `members`
pub fn compute_settlement(members: &[Member]) -> Vec<Payment> {
    settle(members).payments
}

fn pairwise_payments(balances: Balances) -> Vec<Payment> {
    let zero = BigDecimal::from(0);
    let (ids, mut remaining): (Vec<EntityId>, Vec<BigDecimal>) =
        balances.into_entries().into_iter().unzip();
    let mut payments = Vec::new();

    for debtor in 0..remaining.len() {
        if remaining[debtor] >= zero {
            continue;
        }

        for creditor in 0..remaining.len() {
            if remaining[creditor] <= zero {
                continue;
            }

            let owed = -remaining[debtor].clone();
            let amount = if owed < remaining[creditor] {
                owed
            } else {
                remaining[creditor].clone()
            };

            // Unrounded amounts carry over so later transfers stay exact
            remaining[debtor] += &amount;
            remaining[creditor] -= &amount;

            let rounded = amount.with_scale_round(PAYMENT_SCALE, RoundingMode::HalfUp);
            if rounded <= zero {
                continue;
            }

            debug!("Payment {} -> {}: {}", ids[debtor], ids[creditor], rounded);
            payments.push(Payment {
                from_member: ids[debtor].clone(),
                to_member: ids[creditor].clone(),
                amount: rounded,
            });
        }
    }

    payments
}
