//! Course evaluation repository.

use std::sync::Arc;

use crate::entities::{Evaluation, evaluation};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

#[derive(Clone)]
pub struct EvaluationRepository {
    db: Arc<DatabaseConnection>,
}

impl EvaluationRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: evaluation::ActiveModel,
    ) -> AppResult<evaluation::Model> {
        model.insert(conn).await.map_err(AppError::from)
    }

    /// Evaluations of a course (paginated, newest first).
    pub async fn find_by_course(
        &self,
        course_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<evaluation::Model>> {
        Evaluation::find()
            .filter(evaluation::Column::CourseId.eq(course_id))
            .order_by_desc(evaluation::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }
}
