//! Notifications endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use coursehub_common::AppResult;
use coursehub_core::services::permission as perm;
use coursehub_db::entities::notification::{self, NotificationType};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// List notifications query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsQuery {
    /// Maximum results (default: 10, max: 100)
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Cursor for pagination (before this ID)
    pub until_id: Option<String>,
    /// Only unread notifications
    #[serde(default)]
    pub unread_only: bool,
}

const fn default_limit() -> u64 {
    10
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub count: u64,
}

#[derive(Serialize)]
pub struct MarkedResponse {
    pub updated: u64,
}

/// System notification sent by staff.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub content: Option<String>,
}

/// Get notifications for the authenticated user.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<ApiResponse<Vec<notification::Model>>> {
    let notifications = state
        .notification_service
        .get_notifications(
            &user.id,
            query.limit.min(100),
            query.until_id.as_deref(),
            query.unread_only,
        )
        .await?;
    Ok(ApiResponse::ok(notifications))
}

async fn unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UnreadCountResponse>> {
    let count = state.notification_service.count_unread(&user.id).await?;
    Ok(ApiResponse::ok(UnreadCountResponse { count }))
}

async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state
        .notification_service
        .mark_as_read(&user.id, &id)
        .await?;
    Ok(ApiResponse::empty())
}

async fn mark_all_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<MarkedResponse>> {
    let updated = state
        .notification_service
        .mark_all_as_read(&user.id)
        .await?;
    Ok(ApiResponse::ok(MarkedResponse { updated }))
}

async fn send(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SendNotificationRequest>,
) -> AppResult<ApiResponse<notification::Model>> {
    req.validate()?;
    state
        .permission_service
        .require(perm::NOTIFICATION_SEND, user.role)
        .await?;

    let notification = state
        .notification_service
        .create(
            &req.user_id,
            NotificationType::System,
            &req.title,
            req.content,
            None,
        )
        .await?;
    Ok(ApiResponse::ok(notification))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/send", post(send))
        .route("/{id}/read", post(mark_read))
}
