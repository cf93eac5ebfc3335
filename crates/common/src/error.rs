//! Error types for coursehub.
//!
//! Every failure that reaches a client is rendered as the standard envelope
//! `{ "code": <u32>, "msg": <string>, "data": null }` where `code` is one of the
//! fixed [`ErrorCode`] values.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Fixed numeric codes carried in the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 200,

    BadRequest = 1000,
    ValidationError = 1001,

    Unauthorized = 2000,
    TokenInvalid = 2001,
    Forbidden = 2002,

    UserNotFound = 3000,
    UserDisabled = 3001,
    UserExists = 3002,
    InvalidCredentials = 3003,

    NotFound = 4000,
    Conflict = 4001,
    ForeignKeyViolation = 4002,

    OrganizationNotFound = 5000,

    CourseNotFound = 6000,
    CourseFull = 6001,
    CourseClosed = 6002,
    AlreadyEnrolled = 6003,
    CourseNotAvailable = 6004,
    EnrollmentNotFound = 6005,
    AlreadyCheckedIn = 6006,
    AlreadyRated = 6007,
    TrialNotAllowed = 6008,

    CreditNotEnough = 7000,
    CreditAccountNotFound = 7001,
    InvalidCreditAmount = 7002,

    RequestNotFound = 8000,
    RequestAlreadyProcessed = 8001,
    RequestNotOwned = 8002,
    DuplicatePendingRequest = 8003,

    DatabaseError = 9000,
    ConfigError = 9001,
    InternalError = 9002,
}

impl ErrorCode {
    /// Numeric value sent to clients.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User is disabled")]
    UserDisabled,

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Referenced record does not exist: {0}")]
    ForeignKey(String),

    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),

    #[error("Course not found: {0}")]
    CourseNotFound(String),

    #[error("Course is full")]
    CourseFull,

    #[error("Course enrollment is closed")]
    CourseClosed,

    #[error("Already enrolled in this course")]
    AlreadyEnrolled,

    #[error("Course is not available: {0}")]
    CourseNotAvailable(String),

    #[error("Enrollment not found: {0}")]
    EnrollmentNotFound(String),

    #[error("Already checked in")]
    AlreadyCheckedIn,

    #[error("Already rated")]
    AlreadyRated,

    #[error("Trial is not allowed for this course")]
    TrialNotAllowed,

    #[error("Credit not enough: available {available}, required {required}")]
    CreditNotEnough { available: i64, required: i64 },

    #[error("Credit account not found: {0}")]
    CreditAccountNotFound(String),

    #[error("Invalid credit amount: {0}")]
    InvalidCreditAmount(i64),

    #[error("Request not found: {0}")]
    RequestNotFound(String),

    #[error("Request already processed (status: {0})")]
    RequestAlreadyProcessed(String),

    #[error("Only the requester can cancel this request")]
    RequestNotOwned,

    #[error("A pending request already exists")]
    DuplicatePendingRequest,

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_)
            | Self::Validation(_)
            | Self::ForeignKey(_)
            | Self::CourseFull
            | Self::CourseClosed
            | Self::CourseNotAvailable(_)
            | Self::TrialNotAllowed
            | Self::CreditNotEnough { .. }
            | Self::InvalidCreditAmount(_) => StatusCode::BAD_REQUEST,

            Self::Unauthorized | Self::InvalidToken(_) | Self::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }

            Self::Forbidden(_) | Self::UserDisabled | Self::RequestNotOwned => {
                StatusCode::FORBIDDEN
            }

            Self::UserNotFound(_)
            | Self::NotFound(_)
            | Self::OrganizationNotFound(_)
            | Self::CourseNotFound(_)
            | Self::EnrollmentNotFound(_)
            | Self::CreditAccountNotFound(_)
            | Self::RequestNotFound(_) => StatusCode::NOT_FOUND,

            Self::UserExists(_)
            | Self::Conflict(_)
            | Self::AlreadyEnrolled
            | Self::AlreadyCheckedIn
            | Self::AlreadyRated
            | Self::RequestAlreadyProcessed(_)
            | Self::DuplicatePendingRequest => StatusCode::CONFLICT,

            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the numeric error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::InvalidToken(_) => ErrorCode::TokenInvalid,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::UserNotFound(_) => ErrorCode::UserNotFound,
            Self::UserDisabled => ErrorCode::UserDisabled,
            Self::UserExists(_) => ErrorCode::UserExists,
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::ForeignKey(_) => ErrorCode::ForeignKeyViolation,
            Self::OrganizationNotFound(_) => ErrorCode::OrganizationNotFound,
            Self::CourseNotFound(_) => ErrorCode::CourseNotFound,
            Self::CourseFull => ErrorCode::CourseFull,
            Self::CourseClosed => ErrorCode::CourseClosed,
            Self::AlreadyEnrolled => ErrorCode::AlreadyEnrolled,
            Self::CourseNotAvailable(_) => ErrorCode::CourseNotAvailable,
            Self::EnrollmentNotFound(_) => ErrorCode::EnrollmentNotFound,
            Self::AlreadyCheckedIn => ErrorCode::AlreadyCheckedIn,
            Self::AlreadyRated => ErrorCode::AlreadyRated,
            Self::TrialNotAllowed => ErrorCode::TrialNotAllowed,
            Self::CreditNotEnough { .. } => ErrorCode::CreditNotEnough,
            Self::CreditAccountNotFound(_) => ErrorCode::CreditAccountNotFound,
            Self::InvalidCreditAmount(_) => ErrorCode::InvalidCreditAmount,
            Self::RequestNotFound(_) => ErrorCode::RequestNotFound,
            Self::RequestAlreadyProcessed(_) => ErrorCode::RequestAlreadyProcessed,
            Self::RequestNotOwned => ErrorCode::RequestNotOwned,
            Self::DuplicatePendingRequest => ErrorCode::DuplicatePendingRequest,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().as_u32();

        if self.is_server_error() {
            tracing::error!(error = %self, code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code, "Client error occurred");
        }

        let body = Json(json!({
            "code": code,
            "msg": self.to_string(),
            "data": null,
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => return Self::Conflict(detail),
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                return Self::ForeignKey(detail);
            }
            _ => {}
        }

        match err {
            DbErr::RecordNotFound(what) => Self::NotFound(what),
            DbErr::RecordNotUpdated => Self::NotFound("record was not updated".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidToken(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
