//! API response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use coursehub_common::ErrorCode;
use serde::Serialize;

/// Standard response envelope: `{ "code": 200, "msg": "success", "data": ... }`.
///
/// Failures use the same shape through `AppError`'s `IntoResponse`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u32,
    pub msg: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response.
    pub fn ok(data: T) -> Self {
        Self {
            code: ErrorCode::Success.as_u32(),
            msg: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload (`data: null`).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            code: ErrorCode::Success.as_u32(),
            msg: "success".to_string(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let body = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(body["code"], 200);
        assert_eq!(body["msg"], "success");
        assert_eq!(body["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_empty_envelope_has_null_data() {
        let body = serde_json::to_value(ApiResponse::empty()).unwrap();
        assert_eq!(body["code"], 200);
        assert!(body["data"].is_null());
    }
}
