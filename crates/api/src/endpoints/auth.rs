//! Authentication endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use coursehub_common::AppResult;
use coursehub_core::{AuthToken, LoginInput, RegisterInput};
use coursehub_db::entities::user;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Sign up as a student and receive a token right away.
async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<ApiResponse<AuthToken>> {
    let user = state.user_service.register(input).await?;
    let (token, expires_at) = state.user_service.issue_token(&user)?;

    Ok(ApiResponse::ok(AuthToken {
        token,
        expires_at,
        user,
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<ApiResponse<AuthToken>> {
    let token = state.user_service.login(input).await?;
    Ok(ApiResponse::ok(token))
}

/// Get the authenticated user.
async fn me(AuthUser(user): AuthUser) -> AppResult<ApiResponse<user::Model>> {
    Ok(ApiResponse::ok(user))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}
