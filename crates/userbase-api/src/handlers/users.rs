//! Profile handlers for the authenticated caller

use super::{json_body, ApiResponse};
use crate::audit::AuditContext;
use crate::auth::{AuthenticatedIdentity, UpdateProfileRequest};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

/// Get the current account's profile
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.accounts.profile(&identity).await?;

    Ok(ApiResponse::ok("Profile retrieved", profile))
}

/// Update the current account's profile
///
/// Accepts any subset of `username`, `email` and `password`.
pub async fn update_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    headers: HeaderMap,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let context = AuditContext::from_headers(&headers);
    let profile = state
        .accounts
        .update_profile(&identity, request, &context)
        .await?;

    Ok(ApiResponse::ok("Profile updated", profile))
}

/// Delete the current account
pub async fn delete_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);
    state.accounts.delete_account(&identity, &context).await?;

    Ok(ApiResponse::ok("Account deleted", ()))
}
