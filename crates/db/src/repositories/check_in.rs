//! Check-in repository.

use std::sync::Arc;

use crate::entities::{CheckIn, check_in};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};

#[derive(Clone)]
pub struct CheckInRepository {
    db: Arc<DatabaseConnection>,
}

impl CheckInRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: check_in::ActiveModel,
    ) -> AppResult<check_in::Model> {
        model.insert(conn).await.map_err(AppError::from)
    }

    /// All check-ins recorded for a course.
    pub async fn find_by_course(&self, course_id: &str) -> AppResult<Vec<check_in::Model>> {
        CheckIn::find()
            .filter(check_in::Column::CourseId.eq(course_id))
            .order_by_asc(check_in::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }
}
