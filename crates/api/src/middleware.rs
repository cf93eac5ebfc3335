//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use coursehub_common::Config;
use coursehub_core::{
    CompletionRequestService, CourseService, CreditRequestService, CreditService,
    EnrollmentRequestService, EnrollmentService, NotificationService, OrganizationService,
    PermissionService, RefundRequestService, UserService,
};
use coursehub_db::repositories::{
    AchievementRepository, CheckInRepository, CompletionRequestRepository, CourseRepository,
    CreditRepository, CreditRequestRepository, EnrollmentRepository, EnrollmentRequestRepository,
    EvaluationRepository, NotificationRepository, OrganizationRepository, PermissionRepository,
    RefundRequestRepository, UserRepository,
};
use sea_orm::DatabaseConnection;
use tracing::debug;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub organization_service: OrganizationService,
    pub permission_service: PermissionService,
    pub credit_service: CreditService,
    pub course_service: CourseService,
    pub enrollment_service: EnrollmentService,
    pub credit_request_service: CreditRequestService,
    pub refund_request_service: RefundRequestService,
    pub enrollment_request_service: EnrollmentRequestService,
    pub completion_request_service: CompletionRequestService,
    pub notification_service: NotificationService,
}

impl AppState {
    /// Wire every repository and service onto one connection pool.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, config: &Config) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let course_repo = CourseRepository::new(Arc::clone(&db));
        let enrollment_repo = EnrollmentRepository::new(Arc::clone(&db));

        let credit_service = CreditService::new(
            Arc::clone(&db),
            CreditRepository::new(Arc::clone(&db)),
            config.credit.initial_balance,
        );
        let enrollment_service = EnrollmentService::new(
            Arc::clone(&db),
            course_repo.clone(),
            enrollment_repo.clone(),
            CheckInRepository::new(Arc::clone(&db)),
            EvaluationRepository::new(Arc::clone(&db)),
            credit_service.clone(),
        );

        Self {
            user_service: UserService::new(user_repo.clone(), credit_service.clone(), &config.auth),
            organization_service: OrganizationService::new(
                OrganizationRepository::new(Arc::clone(&db)),
                user_repo,
            ),
            permission_service: PermissionService::new(PermissionRepository::new(Arc::clone(&db))),
            course_service: CourseService::new(course_repo.clone()),
            credit_request_service: CreditRequestService::new(
                Arc::clone(&db),
                CreditRequestRepository::new(Arc::clone(&db)),
                credit_service.clone(),
            ),
            refund_request_service: RefundRequestService::new(
                Arc::clone(&db),
                RefundRequestRepository::new(Arc::clone(&db)),
                enrollment_repo.clone(),
                course_repo.clone(),
                credit_service.clone(),
            ),
            enrollment_request_service: EnrollmentRequestService::new(
                Arc::clone(&db),
                EnrollmentRequestRepository::new(Arc::clone(&db)),
                course_repo.clone(),
                enrollment_repo.clone(),
                enrollment_service.clone(),
                credit_service.clone(),
            ),
            completion_request_service: CompletionRequestService::new(
                Arc::clone(&db),
                CompletionRequestRepository::new(Arc::clone(&db)),
                enrollment_repo,
                course_repo,
                AchievementRepository::new(Arc::clone(&db)),
            ),
            notification_service: NotificationService::new(NotificationRepository::new(db)),
            credit_service,
            enrollment_service,
        }
    }
}

/// Authentication middleware.
///
/// Resolves `Authorization: Bearer <jwt>` to a user and stores it in the
/// request extensions. Requests without a valid token pass through
/// unauthenticated; `AuthUser` rejects them where a user is required.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.user_service.authenticate_token(token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => debug!(error = %e, "Rejected bearer token"),
        }
    }

    next.run(req).await
}
