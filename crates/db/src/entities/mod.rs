//! Database entities.

pub mod achievement;
pub mod check_in;
pub mod course;
pub mod course_completion_request;
pub mod credit;
pub mod credit_record;
pub mod credit_request;
pub mod enrollment;
pub mod enrollment_request;
pub mod evaluation;
pub mod notification;
pub mod organization;
pub mod permission;
pub mod refund_request;
pub mod review_status;
pub mod role_permission;
pub mod user;

pub use achievement::Entity as Achievement;
pub use check_in::Entity as CheckIn;
pub use course::Entity as Course;
pub use course_completion_request::Entity as CourseCompletionRequest;
pub use credit::Entity as Credit;
pub use credit_record::Entity as CreditRecord;
pub use credit_request::Entity as CreditRequest;
pub use enrollment::Entity as Enrollment;
pub use enrollment_request::Entity as EnrollmentRequest;
pub use evaluation::Entity as Evaluation;
pub use notification::Entity as Notification;
pub use organization::Entity as Organization;
pub use permission::Entity as Permission;
pub use refund_request::Entity as RefundRequest;
pub use review_status::ReviewStatus;
pub use role_permission::Entity as RolePermission;
pub use user::Entity as User;
