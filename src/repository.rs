use std::sync::{PoisonError, RwLock};

use crate::error::ApiError;
use crate::schemas::{ExpenseRecord, Member};

/// Storage for members and expense records.
///
/// Every read returns a snapshot; the balance and settlement code never sees
/// the store itself.
#[allow(async_fn_in_trait)]
pub trait Repository {
    /// Current members, ordered by name.
    async fn list_members(&self) -> Result<Vec<Member>, ApiError>;

    /// Fails with `Conflict` when a member with the same name exists.
    async fn add_member(&self, member: Member) -> Result<(), ApiError>;

    /// Expense records that mention the member are left untouched.
    async fn remove_member(&self, name: &str) -> Result<(), ApiError>;

    /// All expense records, newest first.
    async fn list_expenses(&self) -> Result<Vec<ExpenseRecord>, ApiError>;

    async fn add_expense(&self, expense: ExpenseRecord) -> Result<(), ApiError>;

    async fn remove_expense(&self, id: &str) -> Result<(), ApiError>;
}

pub(crate) fn sort_members(members: &mut [Member]) {
    members.sort_by(|a, b| a.name.cmp(&b.name));
}

pub(crate) fn sort_expenses(expenses: &mut [ExpenseRecord]) {
    expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[derive(Default)]
struct MemoryState {
    members: Vec<Member>,
    expenses: Vec<ExpenseRecord>,
}

/// Process-local store, used when no database is configured.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    async fn list_members(&self) -> Result<Vec<Member>, ApiError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut members = state.members.clone();
        sort_members(&mut members);
        Ok(members)
    }

    async fn add_member(&self, member: Member) -> Result<(), ApiError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.members.iter().any(|m| m.name == member.name) {
            return Err(ApiError::Conflict(format!(
                "member {} already exists",
                member.name
            )));
        }
        state.members.push(member);
        Ok(())
    }

    async fn remove_member(&self, name: &str) -> Result<(), ApiError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let before = state.members.len();
        state.members.retain(|m| m.name != name);
        if state.members.len() == before {
            return Err(ApiError::NotFound(format!("member {name} not found")));
        }
        Ok(())
    }

    async fn list_expenses(&self) -> Result<Vec<ExpenseRecord>, ApiError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut expenses = state.expenses.clone();
        sort_expenses(&mut expenses);
        Ok(expenses)
    }

    async fn add_expense(&self, expense: ExpenseRecord) -> Result<(), ApiError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.expenses.push(expense);
        Ok(())
    }

    async fn remove_expense(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let before = state.expenses.len();
        state.expenses.retain(|e| e.id != id);
        if state.expenses.len() == before {
            return Err(ApiError::NotFound(format!("expense {id} not found")));
        }
        Ok(())
    }
}
