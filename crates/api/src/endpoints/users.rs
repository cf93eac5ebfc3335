//! User management endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use coursehub_common::{AppError, AppResult};
use coursehub_core::{CreateUserInput, UpdateUserInput, services::permission as perm};
use coursehub_db::{
    entities::user::{self, Role, UserStatus},
    repositories::UserFilter,
};
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// List users query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub role: Option<Role>,
    pub organization_id: Option<String>,
    pub advisor_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignAdvisorRequest {
    pub advisor_id: String,
}

/// List users. Advisors without `user:manage` only see their own students.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<ApiResponse<Vec<user::Model>>> {
    let mut filter = UserFilter {
        role: query.role,
        organization_id: query.organization_id,
        advisor_id: query.advisor_id,
    };

    if !state
        .permission_service
        .has_permission(perm::USER_MANAGE, user.role)
        .await
    {
        if user.role != Role::Advisor {
            return Err(AppError::Forbidden(format!(
                "Missing permission: {}",
                perm::USER_MANAGE
            )));
        }
        filter.advisor_id = Some(user.id.clone());
    }

    let users = state
        .user_service
        .list(&filter, query.limit, query.offset)
        .await?;
    Ok(ApiResponse::ok(users))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> AppResult<ApiResponse<user::Model>> {
    state
        .permission_service
        .require(perm::USER_MANAGE, user.role)
        .await?;

    let created = state.user_service.create_user(input).await?;
    Ok(ApiResponse::ok(created))
}

/// Show a user: yourself, your advisee, or anyone with `user:manage`.
async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<user::Model>> {
    let target = state.user_service.get(&id).await?;

    if target.id != user.id && target.advisor_id.as_deref() != Some(user.id.as_str()) {
        state
            .permission_service
            .require(perm::USER_MANAGE, user.role)
            .await?;
    }

    Ok(ApiResponse::ok(target))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<ApiResponse<user::Model>> {
    let privileged = state
        .permission_service
        .has_permission(perm::USER_MANAGE, user.role)
        .await;
    if id != user.id && !privileged {
        return Err(AppError::Forbidden("Cannot edit other users".to_string()));
    }

    let updated = state
        .user_service
        .update_profile(&id, input, privileged)
        .await?;
    Ok(ApiResponse::ok(updated))
}

async fn set_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> AppResult<ApiResponse<user::Model>> {
    state
        .permission_service
        .require(perm::USER_MANAGE, user.role)
        .await?;
    if id == user.id {
        return Err(AppError::BadRequest(
            "Cannot change your own status".to_string(),
        ));
    }

    let updated = state.user_service.set_status(&id, req.status).await?;
    Ok(ApiResponse::ok(updated))
}

async fn assign_advisor(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignAdvisorRequest>,
) -> AppResult<ApiResponse<user::Model>> {
    state
        .permission_service
        .require(perm::USER_MANAGE, user.role)
        .await?;

    let updated = state
        .user_service
        .assign_advisor(&id, &req.advisor_id)
        .await?;
    Ok(ApiResponse::ok(updated))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).patch(update))
        .route("/{id}/status", post(set_status))
        .route("/{id}/advisor", post(assign_advisor))
}
