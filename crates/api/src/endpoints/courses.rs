//! Course endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use coursehub_common::{AppError, AppResult};
use coursehub_core::{
    CreateCourseInput, ReviewDecision, UpdateCourseInput, services::permission as perm,
};
use coursehub_db::{
    entities::{
        check_in,
        course::{self, ApprovalStatus, CourseStatus, EnrollStatus},
        evaluation,
        notification::NotificationType,
        user::{self, Role},
    },
    repositories::CourseFilter,
};
use serde::Deserialize;

use super::notify;
use crate::{
    extractors::{AuthUser, Pagination},
    middleware::AppState,
    response::ApiResponse,
};

/// List courses query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCoursesQuery {
    pub status: Option<CourseStatus>,
    pub approval_status: Option<ApprovalStatus>,
    pub enroll_status: Option<EnrollStatus>,
    pub organization_id: Option<String>,
    pub teacher_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct EnrollStatusRequest {
    pub open: bool,
}

/// Whether a user may see courses that are not yet available.
async fn sees_unpublished(state: &AppState, user: &user::Model) -> bool {
    user.role == Role::Teacher
        || state
            .permission_service
            .has_permission(perm::COURSE_REVIEW, user.role)
            .await
}

/// List courses. Students only see published, approved courses.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListCoursesQuery>,
) -> AppResult<ApiResponse<Vec<course::Model>>> {
    let mut filter = CourseFilter {
        organization_id: query.organization_id,
        teacher_id: query.teacher_id,
        status: query.status,
        approval_status: query.approval_status,
        enroll_status: query.enroll_status,
    };

    if !sees_unpublished(&state, &user).await {
        filter.status = Some(CourseStatus::Published);
        filter.approval_status = Some(ApprovalStatus::Approved);
    }

    let courses = state
        .course_service
        .list(&filter, query.limit, query.offset)
        .await?;
    Ok(ApiResponse::ok(courses))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateCourseInput>,
) -> AppResult<ApiResponse<course::Model>> {
    state
        .permission_service
        .require(perm::COURSE_CREATE, user.role)
        .await?;

    let course = state.course_service.create(&user, input).await?;
    Ok(ApiResponse::ok(course))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<course::Model>> {
    let course = state.course_service.get(&id).await?;

    if !course.is_available() && !sees_unpublished(&state, &user).await {
        return Err(AppError::CourseNotAvailable(id));
    }

    Ok(ApiResponse::ok(course))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateCourseInput>,
) -> AppResult<ApiResponse<course::Model>> {
    state
        .permission_service
        .require(perm::COURSE_UPDATE, user.role)
        .await?;

    let course = state.course_service.update(&user, &id, input).await?;
    Ok(ApiResponse::ok(course))
}

/// Approve or reject course content; the teacher is notified.
async fn review(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(decision): Json<ReviewDecision>,
) -> AppResult<ApiResponse<course::Model>> {
    state
        .permission_service
        .require(perm::COURSE_REVIEW, user.role)
        .await?;

    let course = state
        .course_service
        .review(&user.id, &id, decision.approved, decision.note)
        .await?;

    if let Some(teacher_id) = &course.teacher_id {
        let verdict = if decision.approved {
            "approved"
        } else {
            "rejected"
        };
        let title = format!("Course \"{}\" was {verdict}", course.title);
        notify(
            &state,
            teacher_id,
            NotificationType::CourseReviewed,
            &title,
            Some(&course.id),
        )
        .await;
    }

    Ok(ApiResponse::ok(course))
}

async fn publish(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<course::Model>> {
    state
        .permission_service
        .require(perm::COURSE_PUBLISH, user.role)
        .await?;

    let course = state.course_service.publish(&id).await?;
    Ok(ApiResponse::ok(course))
}

async fn archive(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<course::Model>> {
    state
        .permission_service
        .require(perm::COURSE_PUBLISH, user.role)
        .await?;

    let course = state.course_service.archive(&id).await?;
    Ok(ApiResponse::ok(course))
}

async fn set_enroll_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EnrollStatusRequest>,
) -> AppResult<ApiResponse<course::Model>> {
    state
        .permission_service
        .require(perm::COURSE_PUBLISH, user.role)
        .await?;

    let course = state.course_service.set_enroll_status(&id, req.open).await?;
    Ok(ApiResponse::ok(course))
}

/// Public ratings of a course.
async fn evaluations(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Vec<evaluation::Model>>> {
    let evaluations = state
        .enrollment_service
        .list_evaluations(&id, page.limit, page.offset)
        .await?;
    Ok(ApiResponse::ok(evaluations))
}

async fn check_ins(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<check_in::Model>>> {
    state
        .permission_service
        .require(perm::ENROLLMENT_VIEW_ALL, user.role)
        .await?;

    let check_ins = state.enrollment_service.list_check_ins(&id).await?;
    Ok(ApiResponse::ok(check_ins))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).patch(update))
        .route("/{id}/review", post(review))
        .route("/{id}/publish", post(publish))
        .route("/{id}/archive", post(archive))
        .route("/{id}/enroll-status", post(set_enroll_status))
        .route("/{id}/evaluations", get(evaluations))
        .route("/{id}/check-ins", get(check_ins))
}
