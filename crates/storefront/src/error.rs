//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; the response body is always the JSON envelope
//! `{"success": false, "error": "...", "fields": [...]}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::FieldError;
use crate::payments::PaymentError;
use crate::services::{AuthError, CheckoutError, WebhookError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request body failed validation.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Resource not found (or not visible to the caller).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Webhook delivery failed authentication.
    #[error("Invalid signature: {0}")]
    Signature(String),

    /// Payment provider refused or failed.
    #[error("Payment error: {0}")]
    Gateway(PaymentError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Signature(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Gateway(PaymentError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
            Self::Gateway(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let (error, fields) = match self {
            Self::Validation(fields) => ("Validation failed".to_string(), fields),
            Self::Database(_) | Self::Internal(_) => ("Internal server error".to_string(), vec![]),
            Self::Gateway(PaymentError::Unavailable(_)) => {
                ("Payment provider unavailable".to_string(), vec![])
            }
            Self::Signature(_) => ("Invalid webhook signature".to_string(), vec![]),
            other => (other.to_string(), vec![]),
        };

        let body = ErrorBody {
            success: false,
            error,
            fields,
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("resource".to_string()),
            RepositoryError::Validation(fields) => Self::Validation(fields),
            other => Self::Database(other),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidSignature(_) => Self::Signature(err.to_string()),
            PaymentError::InvalidPayload(message) => {
                Self::Validation(vec![FieldError::new("body", message)])
            }
            other => Self::Gateway(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self::Unauthorized(err.to_string())
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(fields) => Self::Validation(fields),
            CheckoutError::Repository(e) => e.into(),
            CheckoutError::Payment(e) => e.into(),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Signature(e) => Self::Signature(e.to_string()),
            WebhookError::Payload(e) => e.into(),
            WebhookError::Repository(e) => e.into(),
        }
    }
}

/// A JSON body that is missing, not JSON, or of the wrong shape.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(vec![FieldError::new("body", rejection.body_text())])
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
