//! Application state management

use crate::auth::{AccountService, PasswordConfig, PasswordError, PasswordHasher, TokenService};
use std::sync::Arc;
use std::time::Instant;
use userbase_core::{AccountStore, AppConfig, ConfigError};

/// Application state shared across handlers
pub struct AppState {
    /// Server start time
    pub start_time: Instant,
    /// Account service
    pub accounts: AccountService,
}

impl AppState {
    /// Build state from configuration and an account store
    ///
    /// Fails when the signing secret is missing or a credential setting is
    /// out of range. Both are startup errors.
    pub fn new(config: &AppConfig, store: Arc<dyn AccountStore>) -> Result<Self, ConfigError> {
        let tokens = TokenService::from_config(&config.auth)?;
        let argon2_error = |e: PasswordError| ConfigError::InvalidValue {
            key: "ARGON2_*".to_string(),
            value: e.to_string(),
        };
        let hasher =
            PasswordHasher::new(&PasswordConfig::from(&config.auth)).map_err(argon2_error)?;
        let accounts =
            AccountService::new(store, hasher, tokens, config.auth.password_min_length)
                .map_err(argon2_error)?;

        Ok(Self {
            start_time: Instant::now(),
            accounts,
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use userbase_core::MemoryAccountStore;

    #[test]
    fn test_state_requires_secret() {
        let result = AppState::new(&AppConfig::default(), Arc::new(MemoryAccountStore::new()));
        assert!(matches!(result, Err(ConfigError::MissingRequired(ref key)) if key == "JWT_SECRET"));
    }

    #[test]
    fn test_state_rejects_bad_argon2_params() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some("state-test-secret-state-test-secret!".to_string());
        config.auth.argon2_iterations = 0;

        let result = AppState::new(&config, Arc::new(MemoryAccountStore::new()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_state_rejects_out_of_range_ttl() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some("state-test-secret-state-test-secret!".to_string());
        config.auth.token_ttl_secs = 9_000_000_000_000;

        let result = AppState::new(&config, Arc::new(MemoryAccountStore::new()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { ref key, .. }) if key == "JWT_TTL_SECS"));
    }
}
