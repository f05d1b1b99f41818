use std::fmt;

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

pub mod categories;

pub use categories::ErrorCategory;


#[derive(Debug)]
pub struct AppError {
    pub category: ErrorCategory,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn with_category(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors for common error types
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::Conflict, message)
    }

    pub fn expired(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::Expired, message)
    }

    pub fn backend_transient(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::BackendTransient, message)
    }

    pub fn backend_indeterminate(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::BackendIndeterminate, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::DatabaseError, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::InternalError, message)
    }
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.category.status_code();

        if status.is_server_error() {
            error!(
                category = %self.category,
                message = %self.message,
                details = ?self.details,
                source = ?self.source,
                "Internal server error"
            );
        } else {
            warn!(
                category = %self.category,
                message = %self.message,
                details = ?self.details,
                "Client error"
            );
        }

        let body = json!({
            "error": {
                "code": self.category.error_code(),
                "message": self.message,
                "details": self.details,
            }
        });

        (status, Json(body)).into_response()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // anyhow::Error already carries the full chain, use its string form
        Self::internal_error(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation_error(format!("JSON parsing error: {}", err)).with_source(err)
    }
}
