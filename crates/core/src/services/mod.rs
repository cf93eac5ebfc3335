//! Business logic services.

#![allow(missing_docs)]

pub mod completion_request;
pub mod course;
pub mod credit;
pub mod credit_request;
pub mod enrollment;
pub mod enrollment_request;
pub mod notification;
pub mod organization;
pub mod permission;
pub mod refund_request;
pub mod review;
pub mod user;

pub use completion_request::{CompletionRequestService, CreateCompletionRequestInput};
pub use course::{CourseService, CreateCourseInput, UpdateCourseInput};
pub use credit::{
    Balances, CreditService, GiftResult, LedgerContext, LedgerEntry, LedgerOp, LedgerResult,
};
pub use credit_request::{CreateCreditRequestInput, CreditRequestService};
pub use enrollment::{EnrollmentService, EvaluateInput};
pub use enrollment_request::{CreateEnrollmentRequestInput, EnrollmentRequestService};
pub use notification::NotificationService;
pub use organization::{CreateOrganizationInput, OrganizationService, UpdateOrganizationInput};
pub use permission::PermissionService;
pub use refund_request::{CreateRefundRequestInput, RefundRequestService};
pub use review::{ReviewAction, ReviewDecision};
pub use user::{
    AuthToken, Claims, CreateUserInput, LoginInput, RegisterInput, UpdateUserInput, UserService,
};
