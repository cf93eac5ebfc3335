//! Repository layer.

pub mod achievement;
pub mod check_in;
pub mod completion_request;
pub mod course;
pub mod credit;
pub mod credit_request;
pub mod enrollment;
pub mod enrollment_request;
pub mod evaluation;
pub mod notification;
pub mod organization;
pub mod permission;
pub mod refund_request;
pub mod user;

pub use achievement::AchievementRepository;
pub use check_in::CheckInRepository;
pub use completion_request::CompletionRequestRepository;
pub use course::{CourseFilter, CourseRepository};
pub use credit::CreditRepository;
pub use credit_request::CreditRequestRepository;
pub use enrollment::EnrollmentRepository;
pub use enrollment_request::EnrollmentRequestRepository;
pub use evaluation::EvaluationRepository;
pub use notification::NotificationRepository;
pub use organization::OrganizationRepository;
pub use permission::PermissionRepository;
pub use refund_request::RefundRequestRepository;
pub use user::{UserFilter, UserRepository};

use crate::entities::ReviewStatus;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Filters shared by the review request listings.
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub user_id: Option<String>,
    pub status: Option<ReviewStatus>,
}

/// Outcome written when a pending request is closed.
#[derive(Debug, Clone)]
pub struct ReviewUpdate {
    pub status: ReviewStatus,
    /// `None` when the owner cancels.
    pub reviewer_id: Option<String>,
    pub note: Option<String>,
    pub closed_at: DateTimeWithTimeZone,
}
