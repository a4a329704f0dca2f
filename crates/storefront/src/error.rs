//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error body is JSON: `{ "error": "...", "violations": [...]?, "retryable": bool? }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use mercato_core::Violation;

use crate::db::StoreError;
use crate::services::OrderError;
use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Order lifecycle or query failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Bearer authentication failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Order(OrderError::Store(err))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<&'a [Violation]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retryable: Option<bool>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Order(err) => match err {
                OrderError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                OrderError::NotFound(_) => StatusCode::NOT_FOUND,
                OrderError::Conflict { .. } | OrderError::InvalidTransition(_) => {
                    StatusCode::CONFLICT
                }
                OrderError::Authentication(_) | OrderError::MalformedEvent(_) => {
                    StatusCode::BAD_REQUEST
                }
                OrderError::Gateway(_) => StatusCode::BAD_GATEWAY,
                OrderError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
                OrderError::Store(StoreError::Conflict(_) | StoreError::VersionConflict { .. }) => {
                    StatusCode::CONFLICT
                }
                OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    const fn retryable(&self) -> Option<bool> {
        match self {
            Self::Order(OrderError::Conflict { retryable, .. }) => Some(*retryable),
            Self::Order(OrderError::MalformedEvent(_)) => Some(false),
            Self::Order(
                OrderError::Gateway(_) | OrderError::Store(StoreError::VersionConflict { .. }),
            ) => Some(true),
            _ => None,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Order(err) => match err {
                OrderError::Validation(_) => "Validation failed".to_string(),
                OrderError::NotFound(_) | OrderError::Store(StoreError::NotFound) => {
                    "Order not found".to_string()
                }
                OrderError::Conflict { message, .. } => message.clone(),
                OrderError::InvalidTransition(e) => e.to_string(),
                OrderError::Authentication(e) => e.to_string(),
                OrderError::MalformedEvent(_) => "Unreadable event payload".to_string(),
                OrderError::Gateway(_) => "Checkout provider unavailable".to_string(),
                OrderError::Store(StoreError::Conflict(_) | StoreError::VersionConflict { .. }) => {
                    "Order was modified concurrently".to_string()
                }
                OrderError::Store(_) => "Internal server error".to_string(),
            },
            Self::Auth(AuthError::Forbidden) => "Forbidden".to_string(),
            Self::Auth(AuthError::TokenExpired) => "Token expired".to_string(),
            Self::Auth(_) => "Unauthorized".to_string(),
            _ => self.to_string(),
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
        } else if let Self::Order(OrderError::Authentication(e)) = &self {
            tracing::warn!(error = %e, "Webhook rejected");
        }

        let violations = match &self {
            Self::Order(OrderError::Validation(errors)) => Some(errors.violations()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.message(),
            violations,
            retryable: self.retryable(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an account ID.
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use mercato_core::{OrderId, OrderStatus, TransitionError, ValidationErrors};

    use super::*;
    use crate::checkout::GatewayError;
    use crate::webhooks::WebhookError;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(OrderError::Validation(ValidationErrors::single("items", "empty"))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(OrderError::NotFound(OrderId::generate())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(OrderError::InvalidTransition(TransitionError::Terminal(
                OrderStatus::Delivered
            ))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(OrderError::Authentication(WebhookError::SignatureMismatch)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(OrderError::MalformedEvent("event has no id".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(OrderError::Gateway(GatewayError::Timeout(Duration::from_secs(10)))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(get_status(AuthError::MissingToken), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AuthError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(StoreError::DataCorruption("bad row".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_body_lists_violations() {
        let mut errors = ValidationErrors::new();
        errors.push("items", "must not be empty");
        errors.push("customer_email", "invalid");
        let body = body_json(OrderError::Validation(errors).into()).await;

        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["violations"].as_array().unwrap().len(), 2);
        assert_eq!(body["violations"][0]["field"], "items");
        assert!(body.get("retryable").is_none());
    }

    #[tokio::test]
    async fn test_gateway_error_is_retryable() {
        let err: AppError = OrderError::Gateway(GatewayError::Provider {
            status: 500,
            message: "upstream secret detail".to_string(),
        })
        .into();
        let body = body_json(err).await;
        assert_eq!(body["retryable"], true);
        assert_eq!(body["error"], "Checkout provider unavailable");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let err: AppError = StoreError::DataCorruption("bad status column".to_string()).into();
        let body = body_json(err).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_malformed_event_is_not_retryable() {
        let err: AppError = OrderError::from(WebhookError::MalformedPayload(
            "event has no id".to_string(),
        ))
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = body_json(err).await;
        assert_eq!(body["error"], "Unreadable event payload");
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn test_contention_is_retryable_conflict() {
        let err: AppError = OrderError::Conflict {
            message: "busy".to_string(),
            retryable: true,
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(err).await["retryable"], true);
    }
}
