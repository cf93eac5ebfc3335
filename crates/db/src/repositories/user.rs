//! User repository.

use std::sync::Arc;

use crate::entities::{User, user};
use coursehub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Filters for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<user::Role>,
    pub organization_id: Option<String>,
    pub advisor_id: Option<String>,
}

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    /// Find a user by login name.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await
            .map_err(AppError::from)
    }

    /// Create a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.insert(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// Update a user.
    pub async fn update(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.update(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// List users (paginated, newest first).
    pub async fn list(
        &self,
        filter: &UserFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<user::Model>> {
        let mut query = User::find().order_by_desc(user::Column::CreatedAt);

        if let Some(role) = filter.role {
            query = query.filter(user::Column::Role.eq(role));
        }
        if let Some(org) = &filter.organization_id {
            query = query.filter(user::Column::OrganizationId.eq(org.as_str()));
        }
        if let Some(advisor) = &filter.advisor_id {
            query = query.filter(user::Column::AdvisorId.eq(advisor.as_str()));
        }

        query
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
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            name: None,
            phone: None,
            role: user::Role::Student,
            status: user::UserStatus::Active,
            organization_id: None,
            advisor_id: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_by_id_found() {
        let user = create_test_user("u1", "alice");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user.clone()]])
            .into_connection();

        let repo = UserRepository::new(Arc::new(db));
        let result = repo.get_by_id("u1").await.unwrap();

        assert_eq!(result.username, "alice");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();

        let repo = UserRepository::new(Arc::new(db));
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_role() {
        let a = create_test_user("u1", "alice");
        let b = create_test_user("u2", "bob");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[a, b]])
            .into_connection();

        let repo = UserRepository::new(Arc::new(db));
        let filter = UserFilter {
            role: Some(user::Role::Student),
            ..Default::default()
        };
        let result = repo.list(&filter, 10, 0).await.unwrap();

        assert_eq!(result.len(), 2);
    }
}
