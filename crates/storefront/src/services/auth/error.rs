//! Authentication error types.

use thiserror::Error;

/// Errors that can occur while authenticating a bearer token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization: Bearer ...` header.
    #[error("missing bearer token")]
    MissingToken,

    /// Token signature, structure or claims are invalid.
    #[error("invalid token")]
    InvalidToken,

    /// Token is past its `exp`.
    #[error("token expired")]
    TokenExpired,

    /// `sub` is not an account id.
    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    /// Authenticated, but not allowed to do this.
    #[error("forbidden")]
    Forbidden,
}

impl AuthError {
    /// Whether the caller is authenticated but lacks permission.
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden)
    }
}
