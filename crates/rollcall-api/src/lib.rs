use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use rollcall_storage::{ErrorCategory as StorageErrorCategory, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON error envelope returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    /// Machine-readable code: invalid | unauthorized | forbidden | not-found | rate-limited | internal
    pub code: String,
    /// Human-readable description
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// High-level API errors to be mapped to HTTP responses
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Too many requests: {0}")]
    TooManyRequests(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::TooManyRequests(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "invalid",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not-found",
            ApiError::TooManyRequests(_) => "rate-limited",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::TooManyRequests(msg)
            | ApiError::Internal(msg) => msg.clone(),
        };
        ErrorBody::new(self.code(), message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::to_vec(&self.to_body())
            .unwrap_or_else(|_| br#"{"error":{"code":"internal","message":"serialization failure"}}"#.to_vec());

        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err.category() {
            StorageErrorCategory::NotFound => ApiError::NotFound(err.to_string()),
            StorageErrorCategory::Validation => ApiError::BadRequest(err.to_string()),
            StorageErrorCategory::Seed => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = ApiError::bad_request("Invalid date").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, &HeaderValue::from_static("application/json"));
    }

    #[test]
    fn error_body_shape() {
        let body = ApiError::not_found("section 7b not found").to_body();
        assert_eq!(body.error.code, "not-found");
        assert_eq!(body.error.message, "section 7b not found");

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "not-found");
    }

    #[test]
    fn storage_errors_map_to_api_errors() {
        let err: ApiError = StorageError::section_not_found("7b").into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err: ApiError = StorageError::student_not_in_section("s-1", "7b").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_body().error.message, "Student s-1 is not enrolled in section 7b");
    }

    #[test]
    fn api_error_variants_map_to_status_and_codes() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST, "invalid"),
            (
                ApiError::unauthorized("x"),
                StatusCode::UNAUTHORIZED,
                "unauthorized",
            ),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN, "forbidden"),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND, "not-found"),
            (
                ApiError::too_many_requests("x"),
                StatusCode::TOO_MANY_REQUESTS,
                "rate-limited",
            ),
            (
                ApiError::internal("x"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.to_body().error.code, code);
        }
    }
}
