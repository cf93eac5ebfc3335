//! Credit account and ledger repository.
//!
//! Balance-changing methods take an explicit connection so that they can run
//! inside the caller's transaction.

use std::sync::Arc;

use crate::entities::{Credit, CreditRecord, credit, credit_record};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Credit repository for database operations.
#[derive(Clone)]
pub struct CreditRepository {
    db: Arc<DatabaseConnection>,
}

impl CreditRepository {
    /// Create a new credit repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the credit account of a user.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Option<credit::Model>> {
        Credit::find()
            .filter(credit::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Find the credit account of a user, returning an error if not found.
    pub async fn get_by_user(&self, user_id: &str) -> AppResult<credit::Model> {
        self.find_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::CreditAccountNotFound(user_id.to_string()))
    }

    /// Load the account row with `SELECT ... FOR UPDATE`.
    pub async fn find_by_user_for_update<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> AppResult<Option<credit::Model>> {
        Credit::find()
            .filter(credit::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(AppError::from)
    }

    /// Open a new account.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: credit::ActiveModel,
    ) -> AppResult<credit::Model> {
        model.insert(conn).await.map_err(AppError::from)
    }

    /// Write new counters for an account.
    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: credit::ActiveModel,
    ) -> AppResult<credit::Model> {
        model.update(conn).await.map_err(AppError::from)
    }

    /// Append a ledger record.
    pub async fn insert_record<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: credit_record::ActiveModel,
    ) -> AppResult<credit_record::Model> {
        model.insert(conn).await.map_err(AppError::from)
    }

    /// Ledger records of a user (paginated, newest first).
    pub async fn find_records_by_user(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<credit_record::Model>> {
        let mut query = CreditRecord::find()
            .filter(credit_record::Column::UserId.eq(user_id))
            .order_by_desc(credit_record::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(credit_record::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }
}
