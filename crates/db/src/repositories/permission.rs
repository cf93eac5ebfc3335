//! Permission catalog and role grants.

use std::sync::Arc;

use crate::entities::{Permission, RolePermission, permission, role_permission, user::Role};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Permission repository for database operations.
#[derive(Clone)]
pub struct PermissionRepository {
    db: Arc<DatabaseConnection>,
}

impl PermissionRepository {
    /// Create a new permission repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All known permission codes.
    pub async fn find_all(&self) -> AppResult<Vec<permission::Model>> {
        Permission::find()
            .order_by_asc(permission::Column::Code)
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    pub async fn find_by_code(&self, code: &str) -> AppResult<Option<permission::Model>> {
        Permission::find()
            .filter(permission::Column::Code.eq(code))
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    pub async fn create(&self, model: permission::ActiveModel) -> AppResult<permission::Model> {
        model.insert(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// Every (role, permission) grant.
    pub async fn find_all_grants(&self) -> AppResult<Vec<role_permission::Model>> {
        RolePermission::find()
            .all(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    pub async fn find_grant(
        &self,
        role: Role,
        code: &str,
    ) -> AppResult<Option<role_permission::Model>> {
        RolePermission::find()
            .filter(role_permission::Column::Role.eq(role))
            .filter(role_permission::Column::PermissionCode.eq(code))
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    pub async fn create_grant(
        &self,
        model: role_permission::ActiveModel,
    ) -> AppResult<role_permission::Model> {
        model.insert(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// Remove a grant. Returns the number of rows deleted.
    pub async fn delete_grant(&self, role: Role, code: &str) -> AppResult<u64> {
        let result = RolePermission::delete_many()
            .filter(role_permission::Column::Role.eq(role))
            .filter(role_permission::Column::PermissionCode.eq(code))
            .exec(self.db.as_ref())
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected)
    }
}
