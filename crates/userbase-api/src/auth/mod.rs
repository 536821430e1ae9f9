//! Authentication module
//!
//! Credential hashing, session tokens and the account service, plus the
//! middleware that guards authenticated routes:
//! - Password hashing with Argon2id
//! - Session token issuance and verification
//! - Middleware for request authentication
//! - Account service for registration, login and profile management

pub mod middleware;
pub mod password;
pub mod service;
pub mod token;

pub use middleware::{auth_middleware, extract_bearer};
pub use password::{validate_password_strength, PasswordConfig, PasswordError, PasswordHasher};
pub use service::{
    AccountService, AuthResponse, LoginRequest, RegisterRequest, TokenResponse,
    UpdateProfileRequest,
};
pub use token::{AuthenticatedIdentity, Claims, SessionToken, TokenError, TokenService};
