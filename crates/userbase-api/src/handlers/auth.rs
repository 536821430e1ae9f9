//! Authentication API handlers
//!
//! Provides HTTP endpoints for account registration and login.

use super::{json_body, ApiResponse};
use crate::audit::AuditContext;
use crate::auth::{AuthResponse, LoginRequest, RegisterRequest};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// Register a new account
///
/// Creates an account and returns it together with a session token, so the
/// client is signed in straight away.
///
/// # Request Body
///
/// * `username` - Display name (unique)
/// * `email` - Valid email address (unique, case-insensitive)
/// * `password` - At least the configured minimum length
///
/// # Responses
///
/// * `201 Created` - Account registered
/// * `400 Bad Request` - Missing fields, invalid email or weak password
/// * `409 Conflict` - Email or username already taken
/// * `500 Internal Server Error` - Server error
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let context = AuditContext::from_headers(&headers);
    let response = state.accounts.register(request, &context).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::<AuthResponse>::ok("Registration successful", response),
    ))
}

/// Login with email and password
///
/// # Responses
///
/// * `200 OK` - Authentication successful, returns a session token
/// * `400 Bad Request` - Missing email or password
/// * `401 Unauthorized` - Invalid credentials
/// * `500 Internal Server Error` - Server error
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let context = AuditContext::from_headers(&headers);
    let response = state.accounts.login(request, &context).await?;

    Ok(ApiResponse::ok("Login successful", response))
}
