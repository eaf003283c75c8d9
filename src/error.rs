use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages shared across operations.
pub mod msg {
    pub const ITEM_NOT_FOUND: &str = "Item not found";
    pub const SESSION_NOT_FOUND: &str = "Checkout session not found";
    pub const INVALID_ITEM_ID: &str = "Invalid item id";
    pub const INVALID_USER_ID: &str = "Invalid user id";
    pub const INVALID_SESSION_ID: &str = "Invalid checkout session id";
    pub const INVALID_KIND: &str = "Unknown item kind";
    pub const MISSING_IDENTITY: &str = "Missing authenticated identity";
    pub const PROCESSOR_NOT_CONFIGURED: &str = "Payment processor is not configured";
    pub const ITEM_IS_FREE: &str = "Item is free; nothing to purchase";
    pub const COVERED_BY_MEMBERSHIP: &str = "Item is already included in your membership";
    pub const PAYMENT_NOT_PAID: &str = "Payment has not completed";
    pub const SESSION_KIND_MISMATCH: &str = "Checkout session is for a different kind of item";
    pub const SESSION_USER_MISMATCH: &str = "Checkout session belongs to a different account";
    pub const SESSION_ITEM_MISMATCH: &str = "Checkout session is for a different item";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Already unlocked: {0}")]
    AlreadyUnlocked(String),

    #[error("Payment incomplete: {0}")]
    PaymentIncomplete(String),

    #[error("Metadata mismatch: {0}")]
    MetadataMismatch(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Upstream(format!("Payment processor timed out: {}", e))
        } else {
            AppError::Upstream(format!("Payment processor request failed: {}", e))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "Invalid input", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::AlreadyUnlocked(msg) => {
                (StatusCode::CONFLICT, "Already unlocked", Some(msg.clone()))
            }
            AppError::PaymentIncomplete(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "Payment incomplete", Some(msg.clone()))
            }
            AppError::MetadataMismatch(msg) => {
                (StatusCode::FORBIDDEN, "Metadata mismatch", Some(msg.clone()))
            }
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable", None)
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment processor unavailable", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Converts `Option` lookups into `NotFound` errors.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
