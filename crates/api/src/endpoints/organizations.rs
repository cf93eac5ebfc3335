//! Organization endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use coursehub_common::AppResult;
use coursehub_core::{
    CreateOrganizationInput, UpdateOrganizationInput, services::permission as perm,
};
use coursehub_db::entities::{
    organization::{self, OrganizationStatus},
    user,
};
use serde::Deserialize;

use crate::{
    extractors::{AuthUser, Pagination},
    middleware::AppState,
    response::ApiResponse,
};

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: OrganizationStatus,
}

async fn list(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Vec<organization::Model>>> {
    let organizations = state
        .organization_service
        .list(page.limit, page.offset)
        .await?;
    Ok(ApiResponse::ok(organizations))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateOrganizationInput>,
) -> AppResult<ApiResponse<organization::Model>> {
    state
        .permission_service
        .require(perm::ORGANIZATION_MANAGE, user.role)
        .await?;

    let organization = state.organization_service.create(input).await?;
    Ok(ApiResponse::ok(organization))
}

async fn show(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<organization::Model>> {
    let organization = state.organization_service.get(&id).await?;
    Ok(ApiResponse::ok(organization))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateOrganizationInput>,
) -> AppResult<ApiResponse<organization::Model>> {
    state
        .permission_service
        .require(perm::ORGANIZATION_MANAGE, user.role)
        .await?;

    let organization = state.organization_service.update(&id, input).await?;
    Ok(ApiResponse::ok(organization))
}

async fn set_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> AppResult<ApiResponse<organization::Model>> {
    state
        .permission_service
        .require(perm::ORGANIZATION_MANAGE, user.role)
        .await?;

    let organization = state
        .organization_service
        .set_status(&id, req.status)
        .await?;
    Ok(ApiResponse::ok(organization))
}

/// Members of an organization. Visible to its own members and to managers.
async fn members(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Vec<user::Model>>> {
    if user.organization_id.as_deref() != Some(id.as_str()) {
        state
            .permission_service
            .require(perm::ORGANIZATION_MANAGE, user.role)
            .await?;
    }

    let members = state
        .organization_service
        .list_members(&id, page.limit, page.offset)
        .await?;
    Ok(ApiResponse::ok(members))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).patch(update))
        .route("/{id}/status", post(set_status))
        .route("/{id}/members", get(members))
}
