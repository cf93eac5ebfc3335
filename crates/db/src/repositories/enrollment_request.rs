//! Enrollment request repository.

use std::sync::Arc;

use super::{ReviewFilter, ReviewUpdate};
use crate::entities::{EnrollmentRequest, ReviewStatus, enrollment_request};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Enrollment request repository for database operations.
#[derive(Clone)]
pub struct EnrollmentRequestRepository {
    db: Arc<DatabaseConnection>,
}

impl EnrollmentRequestRepository {
    /// Create a new enrollment request repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a enrollment request by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<enrollment_request::Model>> {
        EnrollmentRequest::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Find a enrollment request by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<enrollment_request::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::RequestNotFound(id.to_string()))
    }

    /// Open enrollment request of a user for a course, if any.
    pub async fn find_pending_by_pair(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> AppResult<Option<enrollment_request::Model>> {
        EnrollmentRequest::find()
            .filter(enrollment_request::Column::UserId.eq(user_id))
            .filter(enrollment_request::Column::CourseId.eq(course_id))
            .filter(enrollment_request::Column::Status.eq(ReviewStatus::Pending))
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: enrollment_request::ActiveModel,
    ) -> AppResult<enrollment_request::Model> {
        model.insert(conn).await.map_err(AppError::from)
    }

    /// List requests (paginated, newest first).
    pub async fn list(
        &self,
        filter: &ReviewFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<enrollment_request::Model>> {
        let mut query =
            EnrollmentRequest::find().order_by_desc(enrollment_request::Column::CreatedAt);

        if let Some(user_id) = &filter.user_id {
            query = query.filter(enrollment_request::Column::UserId.eq(user_id.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(enrollment_request::Column::Status.eq(status));
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
        let result = EnrollmentRequest::update_many()
            .col_expr(enrollment_request::Column::Status, Expr::value(update.status))
            .col_expr(
                enrollment_request::Column::ReviewerId,
                Expr::value(update.reviewer_id.clone()),
            )
            .col_expr(
                enrollment_request::Column::ReviewNote,
                Expr::value(update.note.clone()),
            )
            .col_expr(
                enrollment_request::Column::ReviewedAt,
                Expr::value(update.closed_at),
            )
            .filter(enrollment_request::Column::Id.eq(id))
            .filter(enrollment_request::Column::Status.eq(ReviewStatus::Pending))
            .exec(conn)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected == 1)
    }

    /// Link an approved request to the enrollment it produced.
    pub async fn attach_enrollment<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        enrollment_id: &str,
    ) -> AppResult<()> {
        EnrollmentRequest::update_many()
            .col_expr(
                enrollment_request::Column::EnrollmentId,
                Expr::value(enrollment_id),
            )
            .filter(enrollment_request::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(AppError::from)?;

        Ok(())
    }
}
