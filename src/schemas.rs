use chrono::{DateTime, Utc};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::ApiError;

pub type UserNick = String;

const DEFAULT_CATEGORY: &str = "Uncategorized";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Member {
    pub name: UserNick,
}

impl Member {
    pub fn new(name: impl Into<UserNick>) -> Self {
        Member { name: name.into() }
    }
}

/// A purchase paid by one member and shared by the assignees.
///
/// An empty `assignees` list means the cost is split among everyone who is a
/// member at the time balances are computed.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExpenseRecord {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub category: String,
    pub payer: UserNick,
    #[serde(default, deserialize_with = "stored_assignees")]
    pub assignees: Vec<UserNick>,
    pub created_at: DateTime<Utc>,
}

/// Reads the stored assignee set, accepting a list of names or a JSON-encoded
/// list. Anything else is logged and read as an empty set, which splits the
/// cost among all members.
fn stored_assignees<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<UserNick>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Null,
        Names(Vec<UserNick>),
        Text(String),
        Corrupt(IgnoredAny),
    }

    let assignees = match Stored::deserialize(deserializer)? {
        Stored::Null => Vec::new(),
        Stored::Names(names) => names,
        Stored::Text(text) if text.trim().is_empty() => Vec::new(),
        Stored::Text(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
            warn!(%err, "stored assignees are not a list of names, splitting among all members");
            Vec::new()
        }),
        Stored::Corrupt(_) => {
            warn!("stored assignees are not a list of names, splitting among all members");
            Vec::new()
        }
    };
    Ok(assignees)
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NewMember {
    pub name: String,
}

impl NewMember {
    pub fn validate(self) -> Result<Member, ApiError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("member name must not be blank".into()));
        }
        Ok(Member::new(name))
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NewExpense {
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub category: String,
    pub payer: UserNick,
    #[serde(default)]
    pub assignees: Vec<UserNick>,
}

impl NewExpense {
    /// Checks the input and turns it into a record ready to be stored.
    pub fn into_record(self, id: String, created_at: DateTime<Utc>) -> Result<ExpenseRecord, ApiError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("expense name must not be blank".into()));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ApiError::Validation(format!(
                "expense amount must be a positive number, got {}",
                self.amount
            )));
        }
        let payer = self.payer.trim();
        if payer.is_empty() {
            return Err(ApiError::Validation("expense payer must not be blank".into()));
        }
        let category = match self.category.trim() {
            "" => DEFAULT_CATEGORY.to_string(),
            category => category.to_string(),
        };

        let mut assignees: Vec<UserNick> = Vec::with_capacity(self.assignees.len());
        for assignee in self.assignees {
            let assignee = assignee.trim();
            if !assignee.is_empty() && !assignees.iter().any(|a| a == assignee) {
                assignees.push(assignee.to_string());
            }
        }

        Ok(ExpenseRecord {
            id,
            name: name.to_string(),
            amount: self.amount,
            category,
            payer: payer.to_string(),
            assignees,
            created_at,
        })
    }
}
