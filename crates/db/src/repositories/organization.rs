//! Organization repository.

use std::sync::Arc;

use crate::entities::{Organization, organization};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Organization repository for database operations.
#[derive(Clone)]
pub struct OrganizationRepository {
    db: Arc<DatabaseConnection>,
}

impl OrganizationRepository {
    /// Create a new organization repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an organization by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<organization::Model>> {
        Organization::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Find an organization by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<organization::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::OrganizationNotFound(id.to_string()))
    }

    /// Find an organization by its unique name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<organization::Model>> {
        Organization::find()
            .filter(organization::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    pub async fn create(&self, model: organization::ActiveModel) -> AppResult<organization::Model> {
        model.insert(self.db.as_ref()).await.map_err(AppError::from)
    }

    pub async fn update(&self, model: organization::ActiveModel) -> AppResult<organization::Model> {
        model.update(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// List organizations by name.
    pub async fn list(&self, limit: u64, offset: u64) -> AppResult<Vec<organization::Model>> {
        Organization::find()
            .order_by_asc(organization::Column::Name)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }
}
