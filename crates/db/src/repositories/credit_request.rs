//! Credit request repository.

use std::sync::Arc;

use super::{ReviewFilter, ReviewUpdate};
use crate::entities::{CreditRequest, ReviewStatus, credit_request};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Credit request repository for database operations.
#[derive(Clone)]
pub struct CreditRequestRepository {
    db: Arc<DatabaseConnection>,
}

impl CreditRequestRepository {
    /// Create a new credit request repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a credit request by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<credit_request::Model>> {
        CreditRequest::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Find a credit request by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<credit_request::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::RequestNotFound(id.to_string()))
    }

    /// Whether the user already has an open credit request.
    pub async fn has_pending(&self, user_id: &str) -> AppResult<bool> {
        let found = CreditRequest::find()
            .filter(credit_request::Column::UserId.eq(user_id))
            .filter(credit_request::Column::Status.eq(ReviewStatus::Pending))
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)?;

        Ok(found.is_some())
    }

    pub async fn create(
        &self,
        model: credit_request::ActiveModel,
    ) -> AppResult<credit_request::Model> {
        model.insert(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// List requests (paginated, newest first).
    pub async fn list(
        &self,
        filter: &ReviewFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<credit_request::Model>> {
        let mut query = CreditRequest::find().order_by_desc(credit_request::Column::CreatedAt);

        if let Some(user_id) = &filter.user_id {
            query = query.filter(credit_request::Column::UserId.eq(user_id.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(credit_request::Column::Status.eq(status));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Close a pending request (single conditional UPDATE).
    ///
    /// Returns `false` if the request was no longer pending.
    pub async fn close<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        update: &ReviewUpdate,
    ) -> AppResult<bool> {
        let result = CreditRequest::update_many()
            .col_expr(credit_request::Column::Status, Expr::value(update.status))
            .col_expr(
                credit_request::Column::ReviewerId,
                Expr::value(update.reviewer_id.clone()),
            )
            .col_expr(
                credit_request::Column::ReviewNote,
                Expr::value(update.note.clone()),
            )
            .col_expr(
                credit_request::Column::ReviewedAt,
                Expr::value(update.closed_at),
            )
            .filter(credit_request::Column::Id.eq(id))
            .filter(credit_request::Column::Status.eq(ReviewStatus::Pending))
            .exec(conn)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn approve() -> ReviewUpdate {
        ReviewUpdate {
            status: ReviewStatus::Approved,
            reviewer_id: Some("admin".to_string()),
            note: None,
            closed_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_close_pending_request() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let repo = CreditRequestRepository::new(Arc::new(db));
        let db = repo.db.clone();

        assert!(repo.close(db.as_ref(), "r1", &approve()).await.unwrap());
    }

    #[tokio::test]
    async fn test_close_already_processed_request() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let repo = CreditRequestRepository::new(Arc::new(db));
        let db = repo.db.clone();

        assert!(!repo.close(db.as_ref(), "r1", &approve()).await.unwrap());
    }

    #[tokio::test]
    async fn test_close_binds_status_and_guards_on_pending() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let repo = CreditRequestRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        ));

        assert!(repo.close(&conn, "r1", &approve()).await.unwrap());

        let log = conn.into_transaction_log();
        let stmt = &log[0].statements()[0];
        assert!(stmt.sql.starts_with(r#"UPDATE "credit_request" SET "status" = $1"#));
        assert!(stmt.sql.contains(r#""credit_request"."status" = $"#));
        let values = &stmt.values.as_ref().unwrap().0;
        assert_eq!(values[0], sea_orm::Value::from("APPROVED"));
        assert!(values.contains(&sea_orm::Value::from("PENDING")));
    }

    #[tokio::test]
    async fn test_has_pending_none() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<credit_request::Model>::new()])
            .into_connection();

        let repo = CreditRequestRepository::new(Arc::new(db));

        assert!(!repo.has_pending("u1").await.unwrap());
    }
}
