//! API endpoints.

mod achievements;
mod auth;
mod completion_requests;
mod courses;
mod credit_requests;
mod credits;
mod enrollment_requests;
mod enrollments;
mod notifications;
mod organizations;
mod permissions;
mod refund_requests;
mod requests;
mod users;

use axum::{Router, routing::get};
use coursehub_db::entities::{ReviewStatus, notification::NotificationType};
use serde::Serialize;
use tracing::warn;

use crate::{middleware::AppState, response::ApiResponse};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/organizations", organizations::router())
        .nest("/courses", courses::router())
        .nest("/enrollments", enrollments::router())
        .nest("/credits", credits::router())
        .nest("/credit-requests", credit_requests::router())
        .nest("/refund-requests", refund_requests::router())
        .nest("/enrollment-requests", enrollment_requests::router())
        .nest("/completion-requests", completion_requests::router())
        .nest("/notifications", notifications::router())
        .nest("/permissions", permissions::router())
        .nest("/achievements", achievements::router())
}

/// Router for probes served outside `/api`.
pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> ApiResponse<Health> {
    ApiResponse::ok(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Tell a requester how their request was decided.
///
/// The decision is already committed, so a failed notification is only logged.
async fn notify_review(
    state: &AppState,
    user_id: &str,
    kind: &str,
    status: ReviewStatus,
    note: Option<String>,
    request_id: &str,
) {
    if let Err(e) = state
        .notification_service
        .notify_review(user_id, kind, status, note, request_id)
        .await
    {
        warn!(
            error = %e,
            user_id = %user_id,
            request_id = %request_id,
            "Failed to send review notification"
        );
    }
}

/// Tell a user their balance changed.
async fn notify_credit_change(
    state: &AppState,
    user_id: &str,
    delta: i64,
    balance_after: i64,
    record_id: &str,
) {
    if let Err(e) = state
        .notification_service
        .notify_credit_change(user_id, delta, balance_after, record_id)
        .await
    {
        warn!(error = %e, user_id = %user_id, "Failed to send credit notification");
    }
}

/// Send any other notification, logging failures.
async fn notify(
    state: &AppState,
    user_id: &str,
    notification_type: NotificationType,
    title: &str,
    related_id: Option<&str>,
) {
    if let Err(e) = state
        .notification_service
        .create(user_id, notification_type, title, None, related_id)
        .await
    {
        warn!(error = %e, user_id = %user_id, "Failed to send notification");
    }
}
