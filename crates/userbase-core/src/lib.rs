//! Userbase Core - Account models, store abstraction, and shared types
//!
//! This crate defines the core abstractions used by the userbase API:
//! - Account document model and its public projection
//! - The self-describing stored credential type
//! - The `AccountStore` trait and an in-memory document store
//! - Store error types
//! - Configuration management

pub mod config;
pub mod store;

pub use config::{AppConfig, AuthConfig, ConfigError, LoggingConfig, ServerConfig};
pub use store::MemoryAccountStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by account store implementations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("An account with this {field} already exists")]
    Duplicate { field: &'static str },

    #[error("Database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Credentials
// ============================================================================

/// A stored password hash in PHC string format
///
/// The string embeds the algorithm, its cost parameters and the salt, so a
/// verifier needs nothing besides this value and the candidate plaintext.
/// The plaintext is never held here.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashedCredential(String);

impl HashedCredential {
    /// Wrap an already-computed PHC string
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for HashedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HashedCredential(<redacted>)")
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// Account document as persisted by an `AccountStore`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier (UUID v4, assigned by the store)
    pub id: String,

    /// Unique, trimmed display handle
    pub username: String,

    /// Unique, trimmed, lower-cased email address (used for login)
    pub email: String,

    /// Argon2id hash of the password, never serialized in API responses
    #[serde(skip_serializing)]
    pub password_hash: HashedCredential,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Convert to the representation that is safe to return to clients
    pub fn to_public(&self) -> AccountPublic {
        AccountPublic {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public account representation (no credential material)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPublic {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: HashedCredential,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<HashedCredential>,
}

impl AccountUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password_hash.is_none()
    }
}

/// Normalize an email address the way accounts store it
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize a username the way accounts store it
pub fn normalize_username(username: &str) -> String {
    username.trim().to_string()
}

// ============================================================================
// Store Trait
// ============================================================================

/// Document store holding user accounts
///
/// Lookups return `Ok(None)` for a missing document; `Err` is reserved for
/// store failures and uniqueness violations.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account by its (normalized) email address
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Find an account by its (normalized) username
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account>>;

    /// Find an account by identifier
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Account>>;

    /// Insert a new account, assigning its id and timestamps
    async fn create(&self, account: NewAccount) -> StoreResult<Account>;

    /// Apply a partial update and return the updated document
    async fn update_by_id(&self, id: &str, update: AccountUpdate) -> StoreResult<Option<Account>>;

    /// Remove an account and return the removed document
    async fn delete_by_id(&self, id: &str) -> StoreResult<Option<Account>>;
}
