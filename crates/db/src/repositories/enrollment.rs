//! Enrollment repository.

use std::sync::Arc;

use crate::entities::{Enrollment, enrollment};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Enrollment repository for database operations.
#[derive(Clone)]
pub struct EnrollmentRepository {
    db: Arc<DatabaseConnection>,
}

impl EnrollmentRepository {
    /// Create a new enrollment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an enrollment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<enrollment::Model>> {
        Enrollment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Find an enrollment by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<enrollment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::EnrollmentNotFound(id.to_string()))
    }

    /// Find the enrollment of a user in a course.
    pub async fn find_by_pair(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> AppResult<Option<enrollment::Model>> {
        Enrollment::find()
            .filter(enrollment::Column::UserId.eq(user_id))
            .filter(enrollment::Column::CourseId.eq(course_id))
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: enrollment::ActiveModel,
    ) -> AppResult<enrollment::Model> {
        model.insert(conn).await.map_err(AppError::from)
    }

    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: enrollment::ActiveModel,
    ) -> AppResult<enrollment::Model> {
        model.update(conn).await.map_err(AppError::from)
    }

    /// Move an enrollment out of `from`, only if it is still in that state.
    ///
    /// Returns `false` when another transaction changed it first.
    pub async fn transition<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        from: enrollment::EnrollmentStatus,
        to: enrollment::EnrollmentStatus,
    ) -> AppResult<bool> {
        let result = Enrollment::update_many()
            .col_expr(enrollment::Column::Status, Expr::value(to))
            .col_expr(
                enrollment::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().fixed_offset()),
            )
            .filter(enrollment::Column::Id.eq(id))
            .filter(enrollment::Column::Status.eq(from))
            .exec(conn)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected == 1)
    }

    /// Re-open a refunded enrollment as a paid one.
    ///
    /// Returns `false` when it is no longer refunded.
    pub async fn reactivate<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        credit_cost: i64,
    ) -> AppResult<bool> {
        let result = Enrollment::update_many()
            .col_expr(
                enrollment::Column::Status,
                Expr::value(enrollment::EnrollmentStatus::Enrolled),
            )
            .col_expr(enrollment::Column::CreditCost, Expr::value(credit_cost))
            .col_expr(enrollment::Column::IsTrial, Expr::value(false))
            .col_expr(
                enrollment::Column::TrialStatus,
                Expr::value(enrollment::TrialStatus::None),
            )
            .col_expr(
                enrollment::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().fixed_offset()),
            )
            .filter(enrollment::Column::Id.eq(id))
            .filter(enrollment::Column::Status.eq(enrollment::EnrollmentStatus::Refunded))
            .exec(conn)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected == 1)
    }

    /// Mark an active trial as converted and record what it cost.
    ///
    /// Returns `false` when it is no longer an active trial.
    pub async fn convert_trial<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        credit_cost: i64,
    ) -> AppResult<bool> {
        let result = Enrollment::update_many()
            .col_expr(
                enrollment::Column::TrialStatus,
                Expr::value(enrollment::TrialStatus::Converted),
            )
            .col_expr(enrollment::Column::CreditCost, Expr::value(credit_cost))
            .col_expr(
                enrollment::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().fixed_offset()),
            )
            .filter(enrollment::Column::Id.eq(id))
            .filter(enrollment::Column::TrialStatus.eq(enrollment::TrialStatus::Trial))
            .filter(enrollment::Column::Status.eq(enrollment::EnrollmentStatus::Enrolled))
            .exec(conn)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected == 1)
    }

    /// Enrollments of a user (paginated, newest first).
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<enrollment::Model>> {
        let mut query = Enrollment::find()
            .filter(enrollment::Column::UserId.eq(user_id))
            .order_by_desc(enrollment::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(enrollment::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Enrollments in a course (paginated, oldest first).
    pub async fn find_by_course(
        &self,
        course_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<enrollment::Model>> {
        Enrollment::find()
            .filter(enrollment::Column::CourseId.eq(course_id))
            .order_by_asc(enrollment::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    fn conn(rows_affected: u64) -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected,
            }])
            .into_connection()
    }

    fn repo() -> EnrollmentRepository {
        EnrollmentRepository::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        ))
    }

    #[tokio::test]
    async fn test_reactivate_only_matches_refunded_row() {
        let conn = conn(1);

        assert!(repo().reactivate(&conn, "e1", 10).await.unwrap());

        let log = conn.into_transaction_log();
        let stmt = &log[0].statements()[0];
        assert!(stmt.sql.contains(r#"WHERE "enrollment"."id" = $"#));
        assert!(stmt.sql.contains(r#"AND "enrollment"."status" = $"#));
        let values = &stmt.values.as_ref().unwrap().0;
        assert_eq!(values[0], Value::from("ENROLLED"));
        assert_eq!(values.last(), Some(&Value::from("REFUNDED")));
    }

    #[tokio::test]
    async fn test_reactivate_lost_race() {
        assert!(!repo().reactivate(&conn(0), "e1", 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_convert_trial_only_matches_active_trial() {
        let conn = conn(1);

        assert!(repo().convert_trial(&conn, "e1", 10).await.unwrap());

        let log = conn.into_transaction_log();
        let stmt = &log[0].statements()[0];
        assert!(stmt.sql.contains(r#""enrollment"."trial_status" = $"#));
        assert!(stmt.sql.contains(r#""enrollment"."status" = $"#));
        let values = &stmt.values.as_ref().unwrap().0;
        assert!(values.contains(&Value::from("TRIAL")));
        assert!(values.contains(&Value::from("CONVERTED")));
    }

    #[tokio::test]
    async fn test_transition_lost_race() {
        let moved = repo()
            .transition(
                &conn(0),
                "e1",
                enrollment::EnrollmentStatus::Enrolled,
                enrollment::EnrollmentStatus::Refunded,
            )
            .await
            .unwrap();

        assert!(!moved);
    }
}
