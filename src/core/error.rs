use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Message returned to clients in place of storage and internal failures.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// Any other variant with a structured `details` payload for the client.
    #[error("{error}")]
    Detailed { error: Box<AppError>, details: Value },
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// JSON body of every failed response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Attaches client-visible details. Nested calls keep the innermost kind.
    pub fn with_details(self, details: Value) -> Self {
        match self {
            Self::Detailed { error, .. } => Self::Detailed { error, details },
            other => Self::Detailed {
                error: Box::new(other),
                details,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Detailed { error, .. } => error.status(),
        }
    }

    /// True for failures whose message must not reach the client.
    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }

    /// Client-facing body. Server-side failures are reduced to a generic message.
    pub fn body(&self) -> ErrorBody {
        if self.is_internal() {
            return ErrorBody {
                error: INTERNAL_ERROR_MESSAGE.to_string(),
                details: None,
            };
        }

        match self {
            Self::Detailed { error, details } => ErrorBody {
                error: error.to_string(),
                details: Some(details.clone()),
            },
            other => ErrorBody {
                error: other.to_string(),
                details: None,
            },
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for AppError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Storage(format!("failed to encode snapshot: {err}"))
    }
}

impl From<rmp_serde::decode::Error> for AppError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Storage(format!("failed to decode snapshot: {err}"))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Internal(format!("password hashing failed: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.is_internal() {
            tracing::error!(error = %self, "request failed with internal error");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_each_kind_to_its_status() {
        let cases = [
            (AppError::bad_request("x"), StatusCode::BAD_REQUEST),
            (AppError::not_found("x"), StatusCode::NOT_FOUND),
            (AppError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (AppError::forbidden("x"), StatusCode::FORBIDDEN),
            (AppError::conflict("x"), StatusCode::CONFLICT),
            (AppError::storage("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let body = AppError::storage("disk on fire at /var/data").body();
        assert_eq!(body.error, INTERNAL_ERROR_MESSAGE);
        assert_eq!(body.details, None);
    }

    #[test]
    fn details_keep_inner_status_and_message() {
        let err = AppError::bad_request("Missing required parameter 'username'")
            .with_details(json!({ "parameter": "username" }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            body,
            json!({
                "error": "Missing required parameter 'username'",
                "details": { "parameter": "username" }
            })
        );
    }

    #[test]
    fn body_omits_absent_details() {
        let body = serde_json::to_value(AppError::not_found("Post not found!").body()).unwrap();
        assert_eq!(body, json!({ "error": "Post not found!" }));
    }
}
