//! Userbase API - account registration, login and session server
//!
//! Provides HTTP endpoints for managing accounts, backed by Argon2id
//! credentials and signed, time-bounded session tokens.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;

/// Helpers for integration tests
#[cfg(feature = "test-utils")]
pub mod test_utils {
    use crate::state::AppState;
    use std::sync::Arc;
    use userbase_core::{AppConfig, MemoryAccountStore};

    /// Signing secret used by test state
    pub const TEST_SECRET: &str = "userbase-test-secret-do-not-use-in-production";

    /// Configuration with a fixed secret and light Argon2 parameters
    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some(TEST_SECRET.to_string());
        config.auth.argon2_memory_kib = 4096;
        config.auth.argon2_iterations = 1;
        config.auth.argon2_parallelism = 1;
        config
    }

    /// Application state over an empty in-memory store
    pub fn test_state() -> Arc<AppState> {
        match AppState::new(&test_config(), Arc::new(MemoryAccountStore::new())) {
            Ok(state) => Arc::new(state),
            Err(e) => panic!("test configuration is invalid: {e}"),
        }
    }
}
