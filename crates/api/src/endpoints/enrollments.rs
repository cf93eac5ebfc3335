//! Enrollment endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use coursehub_common::AppResult;
use coursehub_core::{EvaluateInput, services::permission as perm};
use coursehub_db::entities::{check_in, enrollment, evaluation, notification::NotificationType};
use serde::Deserialize;

use super::notify;
use crate::{
    extractors::{AuthUser, Cursor, Pagination},
    middleware::AppState,
    response::ApiResponse,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub course_id: String,
}

/// Enroll in a course, paying its credit cost.
async fn enroll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<EnrollRequest>,
) -> AppResult<ApiResponse<enrollment::Model>> {
    let enrollment = state
        .enrollment_service
        .enroll(&user.id, &req.course_id)
        .await?;

    notify(
        &state,
        &user.id,
        NotificationType::Enrolled,
        "You are enrolled",
        Some(&enrollment.course_id),
    )
    .await;

    Ok(ApiResponse::ok(enrollment))
}

/// Start a free trial.
async fn trial(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<EnrollRequest>,
) -> AppResult<ApiResponse<enrollment::Model>> {
    let enrollment = state
        .enrollment_service
        .enroll_trial(&user.id, &req.course_id)
        .await?;
    Ok(ApiResponse::ok(enrollment))
}

/// Turn a trial into a paid enrollment.
async fn convert(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<enrollment::Model>> {
    let enrollment = state.enrollment_service.convert_trial(&user.id, &id).await?;
    Ok(ApiResponse::ok(enrollment))
}

async fn check_in(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<check_in::Model>> {
    state
        .permission_service
        .require(perm::ENROLLMENT_CHECKIN, user.role)
        .await?;

    let check_in = state.enrollment_service.check_in(&user, &id).await?;
    Ok(ApiResponse::ok(check_in))
}

async fn evaluate(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<EvaluateInput>,
) -> AppResult<ApiResponse<evaluation::Model>> {
    let evaluation = state
        .enrollment_service
        .evaluate(&user.id, &id, input)
        .await?;
    Ok(ApiResponse::ok(evaluation))
}

async fn mine(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(cursor): Query<Cursor>,
) -> AppResult<ApiResponse<Vec<enrollment::Model>>> {
    let enrollments = state
        .enrollment_service
        .list_by_user(&user.id, cursor.limit, cursor.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(enrollments))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<enrollment::Model>> {
    let enrollment = state.enrollment_service.get(&id).await?;

    if enrollment.user_id != user.id {
        state
            .permission_service
            .require(perm::ENROLLMENT_VIEW_ALL, user.role)
            .await?;
    }

    Ok(ApiResponse::ok(enrollment))
}

async fn by_course(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Vec<enrollment::Model>>> {
    state
        .permission_service
        .require(perm::ENROLLMENT_VIEW_ALL, user.role)
        .await?;

    let enrollments = state
        .enrollment_service
        .list_by_course(&course_id, page.limit, page.offset)
        .await?;
    Ok(ApiResponse::ok(enrollments))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/enroll", post(enroll))
        .route("/trial", post(trial))
        .route("/mine", get(mine))
        .route("/course/{course_id}", get(by_course))
        .route("/{id}", get(show))
        .route("/{id}/convert", post(convert))
        .route("/{id}/check-in", post(check_in))
        .route("/{id}/evaluate", post(evaluate))
}
