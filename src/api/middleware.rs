use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Circular dependency in DB schema between tables: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("{0}")]
    EmptyPayload(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors that abort startup rather than fail a single request
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Connection(_)
                | AppError::Config(_)
                | AppError::Schema(_)
                | AppError::CircularDependency(_)
        )
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_detail) = match self {
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", message),
            ),
            AppError::Connection(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new("CONNECTION_ERROR", message),
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CONFIG_ERROR", message),
            ),
            AppError::Schema(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("SCHEMA_ERROR", message),
            ),
            AppError::CircularDependency(tables) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CIRCULAR_DEPENDENCY", message).with_details(tables.join(", ")),
            ),
            AppError::UnsupportedOperator(op) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("UNSUPPORTED_OPERATOR", message).with_details(format!(
                    "Supported operators: $eq, $ne, $gt, $gte, $lt, $lte, $like, $in, $nin (got {})",
                    op
                )),
            ),
            AppError::EmptyPayload(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("EMPTY_PAYLOAD", message),
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message),
            ),
            AppError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", message),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", message),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_detail,
        });

        (status, body).into_response()
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Convert rusqlite::Error to AppError
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<mysql_async::Error> for AppError {
    fn from(err: mysql_async::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        let details = match err.as_db_error() {
            Some(db_error) => format!(
                "Code: {}, Message: {}",
                db_error.code().code(),
                db_error.message()
            ),
            None => err.to_string(),
        };
        AppError::Database(details)
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Schema(format!("Invalid schema document: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_format() {
        let error = AppError::NotFound("Row 4 not found in posts".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_per_call_errors_are_bad_requests() {
        let unsupported = AppError::UnsupportedOperator("$regex".to_string()).into_response();
        assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);

        let empty = AppError::EmptyPayload("No data provided for insert".to_string()).into_response();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_startup_errors_are_fatal() {
        assert!(AppError::CircularDependency(vec!["a".into(), "b".into()]).is_fatal());
        assert!(AppError::Connection("refused".into()).is_fatal());
        assert!(!AppError::UnsupportedOperator("$regex".into()).is_fatal());
        assert!(!AppError::EmptyPayload("No data provided for update".into()).is_fatal());
    }

    #[test]
    fn test_circular_dependency_message_lists_tables() {
        let error = AppError::CircularDependency(vec!["authors".into(), "posts".into()]);
        assert_eq!(
            error.to_string(),
            "Circular dependency in DB schema between tables: authors, posts"
        );
    }

    #[test]
    fn test_error_detail_creation() {
        let detail = ErrorDetail::new("TEST_CODE", "Test message");
        assert_eq!(detail.code, "TEST_CODE");
        assert_eq!(detail.message, "Test message");
        assert!(detail.details.is_none());
    }
}
