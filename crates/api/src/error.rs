use axum::{
    extract::multipart::MultipartError,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use domain::models::image::UploadRejection;
use domain::services::{IdentityError, StorageError};
use serde::Serialize;
use thiserror::Error;

pub const ALREADY_REGISTERED_MESSAGE: &str =
    "User already registered. Please sign in or request a new verification email.";
pub const EMAIL_NOT_CONFIRMED_MESSAGE: &str =
    "Please verify your email before signing in. Check your inbox for the confirmation link.";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please slow down.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<ValidationDetail>,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limited")]
    RateLimited { retry_after: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// A validation error without per-field details.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let mut retry_after_header = None;

        let (status, error_code, message) = match self {
            ApiError::Validation {
                message,
                details: fields,
            } => {
                if !fields.is_empty() {
                    details = serde_json::to_value(fields).ok();
                }
                (StatusCode::BAD_REQUEST, "validation_error", message)
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg)
            }
            ApiError::RateLimited { retry_after } => {
                details = Some(serde_json::json!({ "retry_after": retry_after }));
                retry_after_header = Some(retry_after);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limit_exceeded",
                    RATE_LIMITED_MESSAGE.into(),
                )
            }
            ApiError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::BadGateway(msg) => {
                tracing::warn!(error = %msg, "Upstream service failed");
                (StatusCode::BAD_GATEWAY, "bad_gateway", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code,
            message,
            details,
            timestamp: Utc::now(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after_header {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => ApiError::Conflict("Resource already exists".into()),
                        "23503" => ApiError::NotFound("Referenced resource not found".into()),
                        _ => ApiError::Internal(format!("Database error: {}", db_err)),
                    }
                } else {
                    ApiError::Internal(format!("Database error: {}", db_err))
                }
            }
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .errors()
            .iter()
            .flat_map(|(field, kind)| match kind {
                validator::ValidationErrorsKind::Field(errs) => errs
                    .iter()
                    .map(|e| ValidationDetail {
                        field: field_name(field),
                        message: error_message(e),
                    })
                    .collect::<Vec<_>>(),
                _ => Vec::new(),
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation { message, details }
    }
}

fn field_name(field: &str) -> String {
    // Struct-level (schema) errors are reported under `__all__`.
    if field == "__all__" {
        "body".to_string()
    } else {
        field.to_string()
    }
}

fn error_message(error: &validator::ValidationError) -> String {
    error
        .message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("Invalid value ({})", error.code))
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::AlreadyRegistered => ApiError::Conflict(ALREADY_REGISTERED_MESSAGE.into()),
            IdentityError::InvalidCredentials => ApiError::Unauthorized("Invalid credentials".into()),
            IdentityError::EmailNotConfirmed => {
                ApiError::Unauthorized(EMAIL_NOT_CONFIRMED_MESSAGE.into())
            }
            IdentityError::Rejected(msg) => ApiError::BadRequest(msg),
            IdentityError::Unavailable(msg) => {
                ApiError::BadGateway(format!("Identity provider unavailable: {}", msg))
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<UploadRejection> for ApiError {
    fn from(rejection: UploadRejection) -> Self {
        ApiError::BadRequest(rejection.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge("Request body is too large".into())
        } else {
            ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
        }
    }
}
