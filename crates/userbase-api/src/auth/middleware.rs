//! Authentication middleware for protecting routes
//!
//! Extracts and validates the session token from the Authorization header.
//! On success, adds the `AuthenticatedIdentity` to request extensions.

use super::token::{AuthenticatedIdentity, TokenError};
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authentication middleware that requires a valid session token
///
/// This middleware:
/// 1. Extracts the Authorization header
/// 2. Validates the Bearer token format
/// 3. Validates the token signature, issuer and expiry
/// 4. Adds `AuthenticatedIdentity` to request extensions
///
/// Every failure yields the same 401; the precise reason only reaches the
/// audit log.
///
/// # Usage
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use userbase_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
///
/// In handlers, extract the identity:
///
/// ```
/// use axum::Extension;
/// use userbase_api::auth::AuthenticatedIdentity;
///
/// async fn protected_handler(
///     Extension(identity): Extension<AuthenticatedIdentity>
/// ) -> String {
///     format!("Hello, {}!", identity.subject_id)
/// }
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = match authenticate(&state, request.headers()) {
        Ok(identity) => identity,
        Err(e) => {
            audit_log(
                &AuditEvent::InvalidToken {
                    reason: e.to_string(),
                },
                &AuditContext::from_headers(request.headers()),
            );
            return Err(e.into());
        }
    };

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthenticatedIdentity, TokenError> {
    let token = extract_bearer(headers)?;
    state.accounts.tokens().verify(token)
}

/// Pull the token out of `Authorization: Bearer <token>`
///
/// The scheme is matched case-insensitively. A missing header or an empty
/// token is `Missing`; anything else that is not a Bearer credential is
/// `Invalid`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::Invalid)?
        .trim();

    if value.is_empty() {
        return Err(TokenError::Missing);
    }

    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::Invalid);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Missing);
    }

    Ok(token)
}
