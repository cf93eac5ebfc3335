//! Achievement repository.

use std::sync::Arc;

use crate::entities::{Achievement, achievement};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};

#[derive(Clone)]
pub struct AchievementRepository {
    db: Arc<DatabaseConnection>,
}

impl AchievementRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: achievement::ActiveModel,
    ) -> AppResult<achievement::Model> {
        model.insert(conn).await.map_err(AppError::from)
    }

    /// Achievements earned by a user, newest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<achievement::Model>> {
        Achievement::find()
            .filter(achievement::Column::UserId.eq(user_id))
            .order_by_desc(achievement::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }
}
