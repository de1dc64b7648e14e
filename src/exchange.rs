use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::balance::{resolve_assignees, Balance};
use crate::error::SplitError;
use crate::schemas::{ExpenseRecord, Member, UserNick};

/// Balances within this distance of zero count as settled.
pub const EPSILON: f64 = 0.01;

#[derive(Clone, Debug)]
struct PersonalBalance {
    id: UserNick,
    cents: i64,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
struct UserPair {
    user1: UserNick,
    user2: UserNick,
}

/// A payment of `amount` from `from` to `to`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Exchange {
    pub from: UserNick,
    pub to: UserNick,
    pub amount: f64,
}

/// Settles `balances` by repeatedly matching the largest debtor against the
/// largest creditor.
///
/// Balances are first rounded to whole cents without changing their total
/// (see `to_cents`); a member whose balance rounds to zero cents is settled.
/// Debtors are visited most negative first and creditors most positive first,
/// with ties broken by name. A residual left on one side once the other side
/// is exhausted is discarded.
pub fn simplify(balances: &Balance) -> Vec<Exchange> {
    let mut debtors = Vec::new();
    let mut creditors = Vec::new();

    for (id, cents) in to_cents(balances) {
        if cents < 0 {
            debtors.push(PersonalBalance { id, cents: -cents });
        } else if cents > 0 {
            creditors.push(PersonalBalance { id, cents });
        }
    }

    // Both lists hold magnitudes, so largest first is the order for each.
    debtors.sort_by(by_magnitude_then_name);
    creditors.sort_by(by_magnitude_then_name);

    let mut exchanges = Vec::new();
    let (mut d, mut c) = (0, 0);

    while d < debtors.len() && c < creditors.len() {
        let cents = debtors[d].cents.min(creditors[c].cents);
        exchanges.push(Exchange {
            from: debtors[d].id.clone(),
            to: creditors[c].id.clone(),
            amount: cents as f64 / 100.0,
        });

        debtors[d].cents -= cents;
        creditors[c].cents -= cents;
        if debtors[d].cents == 0 {
            d += 1;
        }
        if creditors[c].cents == 0 {
            c += 1;
        }
    }
    exchanges
}

/// Rounds every balance to whole cents so that the rounded values add up to
/// the rounded total.
///
/// Each balance is floored, then the missing cents go one at a time to the
/// largest fractional parts (ties by name). No member moves by a full cent or
/// more, so paying the rounded amounts leaves everyone within [`EPSILON`].
fn to_cents(balances: &Balance) -> Vec<(UserNick, i64)> {
    let mut entries: Vec<(&UserNick, i64, f64)> = balances
        .iter()
        .map(|(id, &balance)| {
            let scaled = balance * 100.0;
            let floor = scaled.floor();
            (id, floor as i64, scaled - floor)
        })
        .collect();

    let total: f64 = balances.values().map(|balance| balance * 100.0).sum();
    let floored: i64 = entries.iter().map(|(_, cents, _)| cents).sum();
    let missing = (total - floored as f64).round().max(0.0) as usize;

    entries.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .enumerate()
        .map(|(rank, (id, cents, _))| (id.clone(), if rank < missing { cents + 1 } else { cents }))
        .collect()
}

fn by_magnitude_then_name(a: &PersonalBalance, b: &PersonalBalance) -> Ordering {
    b.cents.cmp(&a.cents).then_with(|| a.id.cmp(&b.id))
}

fn round_to_2_decimals(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

/// The exchanges that would be made if no simplification happened: every pair
/// of members is netted on its own.
pub fn pairwise_exchanges(
    members: &[Member],
    records: &[ExpenseRecord],
) -> Result<Vec<Exchange>, SplitError> {
    let known: BTreeSet<&str> = members.iter().map(|m| m.name.as_str()).collect();
    let mut balances_between_people: BTreeMap<UserPair, f64> = BTreeMap::new();

    for record in records {
        let assignees = resolve_assignees(record, &known)?;
        if !known.contains(record.payer.as_str()) {
            continue;
        }
        let amount_per_assignee = record.amount / assignees.len() as f64;

        for assignee in assignees {
            if assignee == record.payer {
                continue;
            }
            // Alphabetical order keeps both directions of a pair under one key.
            // A positive amount means user2 owes user1.
            let (pair, amount) = if record.payer.as_str() < assignee {
                (
                    UserPair {
                        user1: record.payer.clone(),
                        user2: assignee.to_string(),
                    },
                    amount_per_assignee,
                )
            } else {
                (
                    UserPair {
                        user1: assignee.to_string(),
                        user2: record.payer.clone(),
                    },
                    -amount_per_assignee,
                )
            };
            *balances_between_people.entry(pair).or_insert(0.0) += amount;
        }
    }

    let exchanges = balances_between_people
        .into_iter()
        .filter(|(_, balance)| balance.abs() > EPSILON)
        .map(|(pair, balance)| {
            let (from, to) = if balance > 0.0 {
                (pair.user2, pair.user1)
            } else {
                (pair.user1, pair.user2)
            };
            Exchange {
                from,
                to,
                amount: round_to_2_decimals(balance.abs()),
            }
        })
        .collect();
    Ok(exchanges)
}
