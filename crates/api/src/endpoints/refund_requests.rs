//! Refund request endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use coursehub_common::AppResult;
use coursehub_core::{CreateRefundRequestInput, ReviewDecision, services::permission as perm};
use coursehub_db::entities::refund_request;

use super::{
    notify_review,
    requests::{self, ListRequestsQuery},
};
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateRefundRequestInput>,
) -> AppResult<ApiResponse<refund_request::Model>> {
    let request = state.refund_request_service.create(&user.id, input).await?;
    Ok(ApiResponse::ok(request))
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> AppResult<ApiResponse<Vec<refund_request::Model>>> {
    let filter = requests::scope(&state, &user, perm::REFUND_REQUEST_REVIEW, &query).await;
    let list = state
        .refund_request_service
        .list(&filter, query.limit, query.offset)
        .await?;
    Ok(ApiResponse::ok(list))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<refund_request::Model>> {
    let request = state.refund_request_service.get(&id).await?;
    requests::ensure_visible(&state, &user, perm::REFUND_REQUEST_REVIEW, &request.user_id).await?;
    Ok(ApiResponse::ok(request))
}

/// Approve (the enrollment is refunded) or reject.
async fn review(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(decision): Json<ReviewDecision>,
) -> AppResult<ApiResponse<refund_request::Model>> {
    state
        .permission_service
        .require(perm::REFUND_REQUEST_REVIEW, user.role)
        .await?;

    let request = state.refund_request_service.review(&user, &id, decision).await?;
    notify_review(
        &state,
        &request.user_id,
        "refund request",
        request.status,
        request.review_note.clone(),
        &request.id,
    )
    .await;

    Ok(ApiResponse::ok(request))
}

/// Withdraw your own pending request.
async fn cancel(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<refund_request::Model>> {
    let request = state.refund_request_service.cancel(&user.id, &id).await?;
    Ok(ApiResponse::ok(request))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show))
        .route("/{id}/review", post(review))
        .route("/{id}/cancel", post(cancel))
}
