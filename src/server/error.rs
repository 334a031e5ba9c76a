//! API error handling.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{FieldError, RozgarError};

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    /// Field-level details for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// API error type that converts to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub errors: Option<Vec<FieldError>>,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            errors: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_FAILED".to_string(),
            message: "Validation failed".to_string(),
            errors: Some(errors),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Unauthorized")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "Too many requests; back off and retry later",
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", message)
    }

    pub fn overloaded() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "OVERLOADED",
            "Server at capacity, try again shortly",
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            code: self.code,
            message: self.message,
            errors: self.errors,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RozgarError> for ApiError {
    fn from(err: RozgarError) -> Self {
        match err {
            RozgarError::InvalidCoordinate(msg) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_COORDINATES", msg)
            }
            RozgarError::Unauthorized => ApiError::unauthorized(),
            RozgarError::RateLimited => ApiError::rate_limited(),
            RozgarError::JobNotFound(id) => ApiError::not_found(format!("Job '{id}' not found")),
            RozgarError::Validation(errors) => ApiError::validation(errors),
            RozgarError::NoDatabase => {
                ApiError::unavailable("Database not initialized; start the server with a writable data directory")
            }
            RozgarError::CorruptDatabase(msg) => {
                ApiError::unavailable(format!("Corrupt database: {msg}"))
            }
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::internal(format!("Database error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_coordinate_maps_to_400() {
        let api: ApiError = RozgarError::InvalidCoordinate("latitude 99".into()).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, "INVALID_COORDINATES");
    }

    #[test]
    fn test_rate_limited_maps_to_429() {
        let api: ApiError = RozgarError::RateLimited.into();
        assert_eq!(api.status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let api: ApiError = RozgarError::JobNotFound("abc".into()).into();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert!(api.message.contains("abc"));
    }

    #[test]
    fn test_validation_carries_field_errors() {
        let api: ApiError =
            RozgarError::Validation(vec![FieldError::new("phone", "invalid")]).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.errors.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_storage_errors_map_to_500() {
        let api: ApiError = RozgarError::Io(std::io::Error::other("disk gone")).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
