//! Pieces shared by the four review request routers.

use coursehub_common::AppResult;
use coursehub_db::{
    entities::{ReviewStatus, user},
    repositories::ReviewFilter,
};
use serde::Deserialize;

use crate::middleware::AppState;

/// List requests query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequestsQuery {
    pub status: Option<ReviewStatus>,
    /// Only honored for reviewers.
    pub user_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

/// Reviewers see every request; everyone else only their own.
pub async fn scope(
    state: &AppState,
    user: &user::Model,
    review_permission: &str,
    query: &ListRequestsQuery,
) -> ReviewFilter {
    let reviewer = state
        .permission_service
        .has_permission(review_permission, user.role)
        .await;

    ReviewFilter {
        user_id: if reviewer {
            query.user_id.clone()
        } else {
            Some(user.id.clone())
        },
        status: query.status,
    }
}

/// A request is visible to its creator and to reviewers.
pub async fn ensure_visible(
    state: &AppState,
    user: &user::Model,
    review_permission: &str,
    owner_id: &str,
) -> AppResult<()> {
    if owner_id == user.id {
        return Ok(());
    }
    state
        .permission_service
        .require(review_permission, user.role)
        .await
}
