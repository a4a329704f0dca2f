//! Authentication extractors.
//!
//! Callers authenticate with `Authorization: Bearer <jwt>`. Handlers take
//! [`RequireAuth`] for customer endpoints and [`RequireAdmin`] for
//! administrative ones.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, Principal};
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(principal): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", principal.owner_id)
/// }
/// ```
pub struct RequireAuth(pub Principal);

/// Extractor that requires a valid bearer token with the admin role.
pub struct RequireAdmin(pub Principal);

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::InvalidToken);
    }
    Ok(token.trim())
}

fn authenticate(parts: &Parts, state: &AppState) -> Result<Principal, AuthError> {
    let principal = state.tokens().verify(bearer_token(&parts.headers)?)?;
    set_sentry_user(&principal.owner_id);
    tracing::Span::current().record("owner_id", tracing::field::display(principal.owner_id));
    Ok(principal)
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(parts, state)?))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = authenticate(parts, state)?;
        if !principal.is_admin() {
            tracing::warn!(owner_id = %principal.owner_id, "Non-admin attempted admin access");
            return Err(AuthError::Forbidden.into());
        }
        Ok(Self(principal))
    }
}
