//! Authentication error types.

use thiserror::Error;

/// Errors that can occur while authenticating a bearer token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization: Bearer` header.
    #[error("missing bearer token")]
    MissingToken,

    /// Token signature, structure or claims are invalid.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token was valid but has expired.
    #[error("token expired")]
    Expired,
}
