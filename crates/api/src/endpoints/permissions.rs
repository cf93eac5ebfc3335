//! Permission table endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use coursehub_common::{AppError, AppResult};
use coursehub_core::services::permission as perm;
use coursehub_db::entities::{permission, user::Role};
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub role: Role,
    pub code: String,
}

#[derive(Serialize)]
pub struct RolePermissions {
    pub role: Role,
    pub permissions: Vec<String>,
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<permission::Model>>> {
    state
        .permission_service
        .require(perm::PERMISSION_MANAGE, user.role)
        .await?;

    let permissions = state.permission_service.list_permissions().await?;
    Ok(ApiResponse::ok(permissions))
}

/// Permissions held by the caller's role.
async fn mine(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<RolePermissions>> {
    let permissions = state
        .permission_service
        .list_role_permissions(user.role)
        .await;
    Ok(ApiResponse::ok(RolePermissions {
        role: user.role,
        permissions,
    }))
}

async fn of_role(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> AppResult<ApiResponse<RolePermissions>> {
    state
        .permission_service
        .require(perm::PERMISSION_MANAGE, user.role)
        .await?;

    let role =
        Role::parse(&role).ok_or_else(|| AppError::BadRequest(format!("Unknown role: {role}")))?;
    let permissions = state.permission_service.list_role_permissions(role).await;
    Ok(ApiResponse::ok(RolePermissions { role, permissions }))
}

async fn grant(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<GrantRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .permission_service
        .require(perm::PERMISSION_MANAGE, user.role)
        .await?;

    state.permission_service.grant(req.role, &req.code).await?;
    Ok(ApiResponse::empty())
}

async fn revoke(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<GrantRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .permission_service
        .require(perm::PERMISSION_MANAGE, user.role)
        .await?;

    state.permission_service.revoke(req.role, &req.code).await?;
    Ok(ApiResponse::empty())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/mine", get(mine))
        .route("/roles/{role}", get(of_role))
        .route("/grant", post(grant))
        .route("/revoke", post(revoke))
}
