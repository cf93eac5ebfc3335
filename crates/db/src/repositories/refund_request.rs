//! Refund request repository.

use std::sync::Arc;

use super::{ReviewFilter, ReviewUpdate};
use crate::entities::{RefundRequest, ReviewStatus, refund_request};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Refund request repository for database operations.
#[derive(Clone)]
pub struct RefundRequestRepository {
    db: Arc<DatabaseConnection>,
}

impl RefundRequestRepository {
    /// Create a new refund request repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a refund request by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<refund_request::Model>> {
        RefundRequest::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Find a refund request by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<refund_request::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::RequestNotFound(id.to_string()))
    }

    /// Open request for an enrollment, if any.
    pub async fn find_pending_by_enrollment(
        &self,
        enrollment_id: &str,
    ) -> AppResult<Option<refund_request::Model>> {
        RefundRequest::find()
            .filter(refund_request::Column::EnrollmentId.eq(enrollment_id))
            .filter(refund_request::Column::Status.eq(ReviewStatus::Pending))
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    pub async fn create(
        &self,
        model: refund_request::ActiveModel,
    ) -> AppResult<refund_request::Model> {
        model.insert(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// List requests (paginated, newest first).
    pub async fn list(
        &self,
        filter: &ReviewFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<refund_request::Model>> {
        let mut query = RefundRequest::find().order_by_desc(refund_request::Column::CreatedAt);

        if let Some(user_id) = &filter.user_id {
            query = query.filter(refund_request::Column::UserId.eq(user_id.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(refund_request::Column::Status.eq(status));
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
        let result = RefundRequest::update_many()
            .col_expr(refund_request::Column::Status, Expr::value(update.status))
            .col_expr(
                refund_request::Column::ReviewerId,
                Expr::value(update.reviewer_id.clone()),
            )
            .col_expr(
                refund_request::Column::ReviewNote,
                Expr::value(update.note.clone()),
            )
            .col_expr(
                refund_request::Column::ReviewedAt,
                Expr::value(update.closed_at),
            )
            .filter(refund_request::Column::Id.eq(id))
            .filter(refund_request::Column::Status.eq(ReviewStatus::Pending))
            .exec(conn)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected == 1)
    }
}
