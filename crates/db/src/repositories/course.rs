//! Course repository.

use std::sync::Arc;

use crate::entities::{Course, course};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Filters for listing courses.
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub organization_id: Option<String>,
    pub teacher_id: Option<String>,
    pub status: Option<course::CourseStatus>,
    pub approval_status: Option<course::ApprovalStatus>,
    pub enroll_status: Option<course::EnrollStatus>,
}

/// Course repository for database operations.
#[derive(Clone)]
pub struct CourseRepository {
    db: Arc<DatabaseConnection>,
}

impl CourseRepository {
    /// Create a new course repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a course by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<course::Model>> {
        Course::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Find a course by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<course::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::CourseNotFound(id.to_string()))
    }

    pub async fn create(&self, model: course::ActiveModel) -> AppResult<course::Model> {
        model.insert(self.db.as_ref()).await.map_err(AppError::from)
    }

    pub async fn update(&self, model: course::ActiveModel) -> AppResult<course::Model> {
        model.update(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// List courses (paginated, newest first).
    pub async fn list(
        &self,
        filter: &CourseFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<course::Model>> {
        let mut query = Course::find().order_by_desc(course::Column::CreatedAt);

        if let Some(org) = &filter.organization_id {
            query = query.filter(course::Column::OrganizationId.eq(org.as_str()));
        }
        if let Some(teacher) = &filter.teacher_id {
            query = query.filter(course::Column::TeacherId.eq(teacher.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(course::Column::Status.eq(status));
        }
        if let Some(approval) = filter.approval_status {
            query = query.filter(course::Column::ApprovalStatus.eq(approval));
        }
        if let Some(enroll) = filter.enroll_status {
            query = query.filter(course::Column::EnrollStatus.eq(enroll));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Take one seat (single UPDATE guarded by capacity).
    ///
    /// Returns `false` when the course is already full.
    pub async fn claim_seat<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<bool> {
        let result = Course::update_many()
            .col_expr(
                course::Column::EnrolledCount,
                Expr::col(course::Column::EnrolledCount).add(1),
            )
            .filter(course::Column::Id.eq(id))
            .filter(
                Condition::any()
                    .add(course::Column::Capacity.eq(0))
                    .add(
                        Expr::col(course::Column::EnrolledCount)
                            .lt(Expr::col(course::Column::Capacity)),
                    ),
            )
            .exec(conn)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected == 1)
    }

    /// Give back one seat.
    pub async fn release_seat<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<()> {
        Course::update_many()
            .col_expr(
                course::Column::EnrolledCount,
                Expr::col(course::Column::EnrolledCount).sub(1),
            )
            .filter(course::Column::Id.eq(id))
            .filter(course::Column::EnrolledCount.gt(0))
            .exec(conn)
            .await
            .map_err(AppError::from)?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_claim_seat_full() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let repo = CourseRepository::new(Arc::new(db));
        let db = repo.db.clone();
        let claimed = repo.claim_seat(db.as_ref(), "course1").await.unwrap();

        assert!(!claimed);
    }

    #[tokio::test]
    async fn test_claim_seat_ok() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let repo = CourseRepository::new(Arc::new(db));
        let db = repo.db.clone();

        assert!(repo.claim_seat(db.as_ref(), "course1").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<course::Model>::new()])
            .into_connection();

        let repo = CourseRepository::new(Arc::new(db));
        let result = repo.get_by_id("nope").await;

        assert!(matches!(result, Err(AppError::CourseNotFound(_))));
    }
}
