use std::fmt;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    // Client errors
    ValidationError,
    NotFound,
    Conflict,
    Expired,

    // Backend errors
    BackendTransient,
    BackendIndeterminate,

    // System errors
    DatabaseError,
    InternalError,
}

impl ErrorCategory {
    /// Coarse HTTP status. The wallet-facing surface only distinguishes
    /// 200 from 400; backend and persistence failures stay server-side.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError
            | Self::NotFound
            | Self::Conflict
            | Self::Expired => StatusCode::BAD_REQUEST,
            Self::BackendTransient | Self::BackendIndeterminate => StatusCode::BAD_GATEWAY,
            Self::DatabaseError | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Expired => "EXPIRED",
            Self::BackendTransient => "BACKEND_TRANSIENT",
            Self::BackendIndeterminate => "BACKEND_INDETERMINATE",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// JSON-RPC error code for the API dispatch endpoint
    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::ValidationError => -32602,
            Self::NotFound => -32604,
            Self::Conflict => -32605,
            Self::Expired => -32606,
            Self::BackendTransient => -32001,
            Self::BackendIndeterminate => -32002,
            Self::DatabaseError => -32003,
            Self::InternalError => -32603,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationError | Self::NotFound | Self::Conflict | Self::Expired
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error_code())
    }
}
