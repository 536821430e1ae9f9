//! Security audit logging for account and session events
//!
//! All audit events are logged at INFO level with the "audit" target,
//! making them easy to filter and route to security monitoring systems.
//! Events never carry plaintext passwords or token strings.
//!
//! # Example
//!
//! ```ignore
//! use userbase_api::audit::{audit_log, AuditContext, AuditEvent};
//!
//! let context = AuditContext::from_headers(request.headers());
//! audit_log(
//!     &AuditEvent::LoginSuccess {
//!         account_id: account.id.clone(),
//!         email: account.email.clone(),
//!     },
//!     &context,
//! );
//! ```

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Account created
    RegistrationSuccess { account_id: String, email: String },

    /// Registration rejected (validation, duplicate)
    RegistrationFailure { email: String, reason: String },

    /// Credentials accepted and a session token issued
    LoginSuccess { account_id: String, email: String },

    /// Credentials rejected; `reason` is for operators only
    LoginFailure { email: String, reason: String },

    /// Request carried a missing, invalid or expired token
    InvalidToken { reason: String },

    /// Profile fields changed
    ProfileUpdated {
        account_id: String,
        fields: Vec<String>,
    },

    /// Stored credential replaced
    PasswordChange { account_id: String },

    /// Account removed by its owner
    AccountDeleted { account_id: String },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::ProfileUpdated { .. } => "Profile updated",
            AuditEvent::PasswordChange { .. } => "Password changed",
            AuditEvent::AccountDeleted { .. } => "Account deleted",
        }
    }
}

/// Request metadata attached to every audit record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditContext {
    /// Client IP address (extracted from request headers)
    pub ip_address: Option<String>,
    /// User agent string (extracted from request headers)
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log a security audit event with structured fields
///
/// The event is serialized to JSON for log aggregators, e.g.
///
/// ```json
/// {"event_type":"login_success","account_id":"550e8400-...","email":"user@example.com"}
/// ```
pub fn audit_log(event: &AuditEvent, context: &AuditContext) {
    let timestamp: DateTime<Utc> = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        timestamp = %timestamp,
        event = %event_json,
        ip_address = ?context.ip_address,
        user_agent = ?context.user_agent,
        "{}",
        event.summary()
    );
}

/// Extract IP address from request headers
///
/// Checks X-Forwarded-For, then X-Real-IP. Connection info is not consulted.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    // First entry of the proxy chain is the client
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
