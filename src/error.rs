use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::middleware::request_logger::current_request_id;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    #[serde(rename = "AUTH_1001")]
    InvalidCredentials,
    #[serde(rename = "AUTH_1003")]
    SessionInvalid,
    #[serde(rename = "AUTH_1004")]
    SessionMissing,

    // Authorization errors (2xxx)
    #[serde(rename = "AUTHZ_2001")]
    InsufficientPermissions,

    // Validation errors (3xxx)
    #[serde(rename = "VAL_3001")]
    InvalidInput,
    #[serde(rename = "VAL_3002")]
    MissingRequiredField,
    #[serde(rename = "VAL_3003")]
    InvalidFormat,

    // Resource errors (4xxx)
    #[serde(rename = "RES_4001")]
    NotFound,
    #[serde(rename = "RES_4003")]
    Conflict,

    // Persistence errors (7xxx)
    #[serde(rename = "DB_7002")]
    QueryFailed,
    #[serde(rename = "DB_7003")]
    DatabaseTimeout,
    #[serde(rename = "DB_7004")]
    ConstraintViolation,

    // Internal errors (9xxx)
    #[serde(rename = "INT_9999")]
    InternalServerError,
}

impl ErrorCode {
    /// Get numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::InvalidCredentials => 1001,
            ErrorCode::SessionInvalid => 1003,
            ErrorCode::SessionMissing => 1004,

            ErrorCode::InsufficientPermissions => 2001,

            ErrorCode::InvalidInput => 3001,
            ErrorCode::MissingRequiredField => 3002,
            ErrorCode::InvalidFormat => 3003,

            ErrorCode::NotFound => 4001,
            ErrorCode::Conflict => 4003,

            ErrorCode::QueryFailed => 7002,
            ErrorCode::DatabaseTimeout => 7003,
            ErrorCode::ConstraintViolation => 7004,

            ErrorCode::InternalServerError => 9999,
        }
    }

    /// Get user-friendly message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidCredentials => "Invalid email or password",
            ErrorCode::SessionInvalid => "Invalid session token",
            ErrorCode::SessionMissing => "Authentication required. Please log in",

            ErrorCode::InsufficientPermissions => {
                "You don't have permission to perform this action"
            }

            ErrorCode::InvalidInput => "Invalid input provided",
            ErrorCode::MissingRequiredField => "Required field is missing",
            ErrorCode::InvalidFormat => "Invalid format provided",

            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::Conflict => "A conflict occurred with an existing resource",

            // Persistence failures never leak driver detail to the caller
            ErrorCode::QueryFailed
            | ErrorCode::DatabaseTimeout
            | ErrorCode::ConstraintViolation
            | ErrorCode::InternalServerError => "An internal server error occurred",
        }
    }
}

/// Structured error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub request_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub code_number: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("{1}")]
    WithCode(ErrorCode, String),

    #[error("{1}")]
    WithCodeAndDetails(ErrorCode, String, String),

    #[error("Validation failed: {field}")]
    ValidationWithField {
        code: ErrorCode,
        field: String,
        message: String,
    },
}

impl ApiError {
    /// Create error with specific error code
    pub fn with_code(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError::WithCode(code, message.into())
    }

    /// Create error with code and additional details
    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        ApiError::WithCodeAndDetails(code, message.into(), details.into())
    }

    /// Create validation error for specific field
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationWithField {
            code: ErrorCode::InvalidInput,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create validation error for a field that was not supplied
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        ApiError::ValidationWithField {
            code: ErrorCode::MissingRequiredField,
            message: format!("{} is required", field),
            field,
        }
    }

    /// Helper: Invalid credentials. Same message whether the email exists or not.
    pub fn invalid_credentials() -> Self {
        ApiError::Authentication(ErrorCode::InvalidCredentials.message().to_string())
    }

    /// Helper: Resource not found
    pub fn not_found(resource: &str) -> Self {
        ApiError::with_code(ErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Helper: store call exceeded its deadline
    pub fn timeout(operation: &str) -> Self {
        ApiError::with_details(
            ErrorCode::DatabaseTimeout,
            "Persistence timeout",
            format!("{} exceeded the storage deadline", operation),
        )
    }

    /// True for the taxonomy's validation branch
    pub fn is_validation(&self) -> bool {
        self.status_code() == StatusCode::BAD_REQUEST
    }

    /// True for the taxonomy's authentication branch
    pub fn is_authentication(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }

    /// True for the taxonomy's not-found branch
    pub fn is_not_found(&self) -> bool {
        self.status_code() == StatusCode::NOT_FOUND
    }

    /// True for the taxonomy's persistence branch
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            ApiError::Database(_)
                | ApiError::Persistence(_)
                | ApiError::WithCode(ErrorCode::DatabaseTimeout, _)
                | ApiError::WithCodeAndDetails(ErrorCode::DatabaseTimeout, _, _)
                | ApiError::WithCode(ErrorCode::ConstraintViolation, _)
                | ApiError::WithCodeAndDetails(ErrorCode::ConstraintViolation, _, _)
        )
    }

    /// Get error code
    fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::Authentication(_) => ErrorCode::InvalidCredentials,
            ApiError::Unauthorized(_) => ErrorCode::SessionMissing,
            ApiError::Forbidden(_) => ErrorCode::InsufficientPermissions,
            ApiError::Validation(_) => ErrorCode::InvalidInput,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::Conflict(_) => ErrorCode::Conflict,
            ApiError::Database(sqlx::Error::PoolTimedOut) => ErrorCode::DatabaseTimeout,
            ApiError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                ErrorCode::ConstraintViolation
            }
            ApiError::Database(_) => ErrorCode::QueryFailed,
            ApiError::Persistence(_) => ErrorCode::QueryFailed,
            ApiError::Internal(_) => ErrorCode::InternalServerError,
            ApiError::WithCode(code, _) => *code,
            ApiError::WithCodeAndDetails(code, _, _) => *code,
            ApiError::ValidationWithField { code, .. } => *code,
        }
    }

    /// Get field name for validation errors
    fn error_field(&self) -> Option<String> {
        match self {
            ApiError::ValidationWithField { field, .. } => Some(field.clone()),
            _ => None,
        }
    }

    /// Get status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Authentication(_)
            | ApiError::Unauthorized(_)
            | ApiError::WithCode(ErrorCode::InvalidCredentials, _)
            | ApiError::WithCode(ErrorCode::SessionInvalid, _)
            | ApiError::WithCode(ErrorCode::SessionMissing, _) => StatusCode::UNAUTHORIZED,

            ApiError::Forbidden(_) | ApiError::WithCode(ErrorCode::InsufficientPermissions, _) => {
                StatusCode::FORBIDDEN
            }

            ApiError::Validation(_)
            | ApiError::ValidationWithField { .. }
            | ApiError::WithCode(ErrorCode::InvalidInput, _)
            | ApiError::WithCode(ErrorCode::MissingRequiredField, _)
            | ApiError::WithCode(ErrorCode::InvalidFormat, _)
            | ApiError::WithCodeAndDetails(ErrorCode::InvalidInput, _, _)
            | ApiError::WithCodeAndDetails(ErrorCode::InvalidFormat, _, _) => {
                StatusCode::BAD_REQUEST
            }

            ApiError::NotFound(_) | ApiError::WithCode(ErrorCode::NotFound, _) => {
                StatusCode::NOT_FOUND
            }

            ApiError::Conflict(_) | ApiError::WithCode(ErrorCode::Conflict, _) => {
                StatusCode::CONFLICT
            }

            ApiError::Database(_)
            | ApiError::Persistence(_)
            | ApiError::Internal(_)
            | ApiError::WithCode(_, _)
            | ApiError::WithCodeAndDetails(_, _, _) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log error with appropriate level
    fn log_error(&self, request_id: &str) {
        match self.status_code() {
            status if status.is_server_error() => {
                error!(
                    request_id = %request_id,
                    error = %self,
                    "Server error occurred"
                );
            }
            status if status.is_client_error() => {
                warn!(
                    request_id = %request_id,
                    error = %self,
                    "Client error occurred"
                );
            }
            _ => {}
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = current_request_id().unwrap_or_else(|| Uuid::new_v4().to_string());
        let status = self.status_code();
        let code = self.error_code();

        self.log_error(&request_id);

        // Server-side detail stays in the log line above
        let (message, details) = if status.is_server_error() {
            (code.message().to_string(), None)
        } else {
            let message = match &self {
                ApiError::WithCode(_, msg) | ApiError::WithCodeAndDetails(_, msg, _) => {
                    msg.clone()
                }
                ApiError::ValidationWithField { message, .. } => message.clone(),
                ApiError::Validation(msg)
                | ApiError::NotFound(msg)
                | ApiError::Conflict(msg)
                | ApiError::Forbidden(msg)
                | ApiError::Unauthorized(msg)
                | ApiError::Authentication(msg) => msg.clone(),
                _ => code.message().to_string(),
            };
            let details = match &self {
                ApiError::WithCodeAndDetails(_, _, details) => Some(details.clone()),
                _ => None,
            };
            (message, details)
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code,
                code_number: code.code(),
                message,
                details,
                field: self.error_field(),
            },
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Handle Axum JSON rejections and convert to structured API errors
pub fn handle_rejection(err: JsonRejection) -> ApiError {
    match err {
        JsonRejection::JsonDataError(e) => ApiError::with_details(
            ErrorCode::InvalidInput,
            "Invalid input provided",
            e.body_text(),
        ),
        JsonRejection::JsonSyntaxError(_) => {
            ApiError::with_code(ErrorCode::InvalidFormat, "Invalid JSON format")
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::with_code(ErrorCode::InvalidFormat, "JSON content type required")
        }
        JsonRejection::BytesRejection(_) => {
            ApiError::with_code(ErrorCode::InvalidInput, "Invalid request body format")
        }
        _ => ApiError::with_details(
            ErrorCode::InvalidInput,
            "Invalid input provided",
            err.body_text(),
        ),
    }
}
