//! Achievement endpoints.

use axum::{Router, extract::State, routing::get};
use coursehub_common::AppResult;
use coursehub_db::entities::achievement;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

async fn mine(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<achievement::Model>>> {
    let achievements = state
        .completion_request_service
        .list_achievements(&user.id)
        .await?;
    Ok(ApiResponse::ok(achievements))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/mine", get(mine))
}
