use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::error::SplitError;
use crate::schemas::{ExpenseRecord, Member, UserNick};

/// Net position of every member: positive is owed money, negative owes money.
pub type Balance = BTreeMap<UserNick, f64>;

/// Picks the members who share the cost of `record`.
///
/// The stored assignee set is used when it is non-empty and every name in it
/// is a current member. Otherwise the cost is split among all `members`.
pub(crate) fn resolve_assignees<'a>(
    record: &'a ExpenseRecord,
    members: &BTreeSet<&'a str>,
) -> Result<Vec<&'a str>, SplitError> {
    let assignees: Vec<&str> = if record.assignees.is_empty() {
        debug!(expense = %record.id, "no assignees stored, splitting among all members");
        members.iter().copied().collect()
    } else {
        let unknown: Vec<&str> = record
            .assignees
            .iter()
            .map(String::as_str)
            .filter(|name| !members.contains(name))
            .collect();
        if unknown.is_empty() {
            record.assignees.iter().map(String::as_str).collect()
        } else {
            warn!(
                expense = %record.id,
                ?unknown,
                "assignees are not current members, splitting among all members"
            );
            members.iter().copied().collect()
        }
    };

    if assignees.is_empty() {
        return Err(SplitError::InvalidState(format!(
            "expense {} cannot be split: there are no members",
            record.id
        )));
    }
    Ok(assignees)
}

/// Computes every member's balance from scratch.
///
/// Payers and assignees that are no longer members are skipped, so the
/// balances only add up to zero when every record refers to current members.
pub fn compute_balances(
    members: &[Member],
    records: &[ExpenseRecord],
) -> Result<Balance, SplitError> {
    let known: BTreeSet<&str> = members.iter().map(|m| m.name.as_str()).collect();
    let mut balance: Balance = known.iter().map(|name| (name.to_string(), 0.0)).collect();

    for record in records {
        let assignees = resolve_assignees(record, &known)?;

        match balance.get_mut(&record.payer) {
            Some(value) => *value += record.amount,
            None => debug!(expense = %record.id, payer = %record.payer, "skipping unknown payer"),
        }

        let amount_per_assignee = record.amount / assignees.len() as f64;
        for assignee in assignees {
            if let Some(value) = balance.get_mut(assignee) {
                *value -= amount_per_assignee;
            }
        }
    }
    Ok(balance)
}
