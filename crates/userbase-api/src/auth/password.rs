//! Password hashing and verification using Argon2id
//!
//! Implements secure password hashing following OWASP recommendations:
//! - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
//! - Memory: 64 MB
//! - Iterations: 3
//! - Parallelism: 4 lanes
//! - Salt: 16 bytes random, fresh for every hash
//! - Output: 32 bytes hash
//!
//! The stored form is a PHC string, so verification reads the algorithm,
//! parameters and salt back out of the stored value itself.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use userbase_core::{AuthConfig, HashedCredential};

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid password: {0}")]
    InvalidInput(String),

    #[error("Invalid password hashing parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Hashing task failed: {0}")]
    TaskFailed(String),
}

/// Password hashing configuration
///
/// These parameters are tuned for security while maintaining acceptable performance.
/// Increasing memory or iterations improves security but slows down hashing.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (lanes, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl From<&AuthConfig> for PasswordConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            memory_cost: config.argon2_memory_kib,
            time_cost: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
            ..Default::default()
        }
    }
}

impl PasswordConfig {
    /// Create Argon2 parameters from this configuration
    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))
    }
}

/// Argon2id hasher holding validated, read-only parameters
///
/// Cloning is cheap; one instance is built at startup and shared by every
/// request. Clones share the verification counter.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
    verifications: Arc<AtomicU64>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::new(65536, 3, 4, Some(32)).unwrap_or_default(),
            verifications: Arc::default(),
        }
    }
}

impl PasswordHasher {
    /// Build a hasher, rejecting parameters Argon2 cannot run with
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        Ok(Self {
            params: config.to_params()?,
            verifications: Arc::default(),
        })
    }

    /// Number of Argon2 verifications run by this hasher and its clones
    pub fn verification_count(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password
    ///
    /// # Returns
    ///
    /// * `Ok(HashedCredential)` - PHC string (includes algorithm, parameters, salt, and hash)
    /// * `Err(PasswordError::InvalidInput)` - If the password is empty
    ///
    /// # Example
    ///
    /// ```no_run
    /// use userbase_api::auth::password::PasswordHasher;
    ///
    /// let hasher = PasswordHasher::default();
    /// let hash = hasher.hash("SecureP@ssw0rd!").expect("Failed to hash password");
    /// assert!(hash.as_str().starts_with("$argon2id$v=19$m=65536,t=3,p=4$"));
    /// ```
    pub fn hash(&self, plaintext: &str) -> Result<HashedCredential, PasswordError> {
        if plaintext.is_empty() {
            return Err(PasswordError::InvalidInput(
                "password must not be empty".to_string(),
            ));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(HashedCredential::from_phc(password_hash.to_string()))
    }

    /// Verify a plaintext password against a stored hash
    ///
    /// The parameters embedded in `stored` are used, not the ones this hasher
    /// was built with, so hashes survive a change of cost settings. The final
    /// digest comparison is constant-time.
    ///
    /// Returns `false` for a wrong password, an empty password, or a stored
    /// value that is not a valid PHC string. It never errors.
    pub fn verify(&self, stored: &HashedCredential, plaintext: &str) -> bool {
        if plaintext.is_empty() {
            return false;
        }

        let parsed = match PasswordHash::new(stored.as_str()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored credential is not a valid PHC string");
                return false;
            }
        };

        self.verifications.fetch_add(1, Ordering::Relaxed);
        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Credential verification failed");
                false
            }
        }
    }

    /// `hash` on the blocking thread pool
    pub async fn hash_blocking(&self, plaintext: String) -> Result<HashedCredential, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
    }

    /// `verify` on the blocking thread pool
    pub async fn verify_blocking(&self, stored: HashedCredential, plaintext: String) -> bool {
        let hasher = self.clone();
        match tokio::task::spawn_blocking(move || hasher.verify(&stored, &plaintext)).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }
}

/// Validate password strength
///
/// Registration-time policy only. `PasswordHasher::hash` accepts any
/// non-empty password.
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), PasswordError> {
    if password.trim().is_empty() {
        return Err(PasswordError::InvalidInput(
            "password must not be empty".to_string(),
        ));
    }

    if password.chars().count() < min_length {
        return Err(PasswordError::InvalidInput(format!(
            "password must be at least {min_length} characters long"
        )));
    }

    Ok(())
}
