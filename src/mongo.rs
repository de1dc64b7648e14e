use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, IndexModel,
};
use tracing::info;

use crate::error::ApiError;
use crate::repository::{sort_expenses, sort_members, Repository};
use crate::schemas::{ExpenseRecord, Member};

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoRepository {
    members: Collection<Member>,
    expenses: Collection<ExpenseRecord>,
}

impl MongoRepository {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, mongodb::error::Error> {
        let client = Client::with_uri_str(uri).await?;
        let database = client.database(database);
        let members = database.collection::<Member>("Members");
        let expenses = database.collection::<ExpenseRecord>("Expenses");

        let unique_name = IndexModel::builder()
            .keys(doc! { "name": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        members.create_index(unique_name, None).await?;
        let by_id = IndexModel::builder().keys(doc! { "id": 1 }).build();
        expenses.create_index(by_id, None).await?;

        info!(database = %database.name(), "connected to MongoDB");
        Ok(MongoRepository { members, expenses })
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

impl Repository for MongoRepository {
    async fn list_members(&self) -> Result<Vec<Member>, ApiError> {
        let mut members: Vec<Member> = self.members.find(None, None).await?.try_collect().await?;
        sort_members(&mut members);
        Ok(members)
    }

    async fn add_member(&self, member: Member) -> Result<(), ApiError> {
        match self.members.insert_one(&member, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(ApiError::Conflict(format!(
                "member {} already exists",
                member.name
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn remove_member(&self, name: &str) -> Result<(), ApiError> {
        let result = self.members.delete_one(doc! { "name": name }, None).await?;
        if result.deleted_count == 0 {
            return Err(ApiError::NotFound(format!("member {name} not found")));
        }
        Ok(())
    }

    async fn list_expenses(&self) -> Result<Vec<ExpenseRecord>, ApiError> {
        let mut expenses: Vec<ExpenseRecord> =
            self.expenses.find(None, None).await?.try_collect().await?;
        sort_expenses(&mut expenses);
        Ok(expenses)
    }

    async fn add_expense(&self, expense: ExpenseRecord) -> Result<(), ApiError> {
        self.expenses.insert_one(&expense, None).await?;
        Ok(())
    }

    async fn remove_expense(&self, id: &str) -> Result<(), ApiError> {
        let result = self.expenses.delete_one(doc! { "id": id }, None).await?;
        if result.deleted_count == 0 {
            return Err(ApiError::NotFound(format!("expense {id} not found")));
        }
        Ok(())
    }
}
