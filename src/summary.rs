use std::collections::BTreeMap;

use serde::Serialize;

use crate::schemas::ExpenseRecord;

/// Total spend and its breakdown per category.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub total: f64,
    pub by_category: BTreeMap<String, f64>,
}

pub fn summarize(records: &[ExpenseRecord]) -> Summary {
    let mut by_category = BTreeMap::new();
    for record in records {
        *by_category.entry(record.category.clone()).or_insert(0.0) += record.amount;
    }
    Summary {
        total: records.iter().map(|r| r.amount).sum(),
        by_category,
    }
}
