//! Course completion request endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use coursehub_common::AppResult;
use coursehub_core::{CreateCompletionRequestInput, ReviewDecision, services::permission as perm};
use coursehub_db::entities::{
    ReviewStatus, course_completion_request, notification::NotificationType,
};

use super::{
    notify, notify_review,
    requests::{self, ListRequestsQuery},
};
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateCompletionRequestInput>,
) -> AppResult<ApiResponse<course_completion_request::Model>> {
    let request = state.completion_request_service.create(&user.id, input).await?;
    Ok(ApiResponse::ok(request))
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> AppResult<ApiResponse<Vec<course_completion_request::Model>>> {
    let filter = requests::scope(&state, &user, perm::COMPLETION_REQUEST_REVIEW, &query).await;
    let list = state
        .completion_request_service
        .list(&filter, query.limit, query.offset)
        .await?;
    Ok(ApiResponse::ok(list))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<course_completion_request::Model>> {
    let request = state.completion_request_service.get(&id).await?;
    requests::ensure_visible(&state, &user, perm::COMPLETION_REQUEST_REVIEW, &request.user_id)
        .await?;
    Ok(ApiResponse::ok(request))
}

/// Approve (enrollment completed, achievement issued) or reject.
async fn review(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(decision): Json<ReviewDecision>,
) -> AppResult<ApiResponse<course_completion_request::Model>> {
    state
        .permission_service
        .require(perm::COMPLETION_REQUEST_REVIEW, user.role)
        .await?;

    let request = state.completion_request_service.review(&user, &id, decision).await?;
    notify_review(
        &state,
        &request.user_id,
        "completion request",
        request.status,
        request.review_note.clone(),
        &request.id,
    )
    .await;

    if request.status == ReviewStatus::Approved {
        notify(
            &state,
            &request.user_id,
            NotificationType::Achievement,
            "You earned a new achievement",
            Some(&request.course_id),
        )
        .await;
    }

    Ok(ApiResponse::ok(request))
}

/// Withdraw your own pending request.
async fn cancel(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<course_completion_request::Model>> {
    let request = state.completion_request_service.cancel(&user.id, &id).await?;
    Ok(ApiResponse::ok(request))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show))
        .route("/{id}/review", post(review))
        .route("/{id}/cancel", post(cancel))
}
