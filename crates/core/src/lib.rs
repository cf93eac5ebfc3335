//! Core business logic for coursehub.
//!
//! Services own the rules of the platform: the credit ledger, course
//! publication, enrollment, the four review workflows, permissions and
//! notifications. They talk to the database through `coursehub-db`
//! repositories and report failures as [`coursehub_common::AppError`].

pub mod services;

pub use services::*;
