//! HTTP API layer for coursehub.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: auth, users, organizations, courses, enrollments, the
//!   credit ledger, review requests, notifications and permissions
//! - **Extractors**: Authentication, pagination
//! - **Middleware**: Bearer token authentication
//!
//! Every response uses the `{code, msg, data}` envelope.
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::{health_router, router};
