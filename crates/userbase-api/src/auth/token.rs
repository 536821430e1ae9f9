//! Session token issuance and verification
//!
//! Implements stateless session tokens as HS256-signed JWTs. The payload is
//! the subject, issue time and expiry plus the issuer; nothing is stored
//! server-side, so a token stays valid until it expires.
//!
//! The signing secret is injected at construction. A missing secret is a
//! startup error, never a per-request one.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use userbase_core::{AuthConfig, ConfigError};

/// The only signing algorithm issued or accepted
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Secrets shorter than this are accepted with a warning
const RECOMMENDED_SECRET_LEN: usize = 32;

/// JWT claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - account ID
    pub sub: String,
    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,
}

/// Session token errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("No session token presented")]
    Missing,

    #[error("Invalid session token")]
    Invalid,

    #[error("Session token has expired")]
    Expired,

    #[error("Invalid token request: {0}")]
    InvalidInput(String),

    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// An issued, signed session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    /// Compact JWT handed to the client
    pub token: String,
    pub subject_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Identity established by a successfully verified token
///
/// Scoped to a single request: the middleware inserts it into the request
/// extensions and handlers take it as an extractor argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub subject_id: String,
}

/// Issues and verifies session tokens with a process-wide secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    default_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service
    ///
    /// # Errors
    ///
    /// * `ConfigError::MissingRequired` - If the secret is empty
    /// * `ConfigError::InvalidValue` - If the TTL is zero or pushes expiry out of range
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        default_ttl: Duration,
    ) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if secret.len() < RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                len = secret.len(),
                recommended = RECOMMENDED_SECRET_LEN,
                "JWT secret is shorter than recommended"
            );
        }
        // Every session issued from now on must have a representable expiry
        let expiry_fits = chrono::Duration::from_std(default_ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .is_some();
        if default_ttl.is_zero() || !expiry_fits {
            return Err(ConfigError::InvalidValue {
                key: "JWT_TTL_SECS".to_string(),
                value: default_ttl.as_secs().to_string(),
            });
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            default_ttl,
        })
    }

    /// Create a token service from the auth section of the app config
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let secret = config
            .jwt_secret
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired("JWT_SECRET".to_string()))?;
        Self::new(secret, config.issuer.clone(), config.token_ttl())
    }

    /// Configured session lifetime
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a token for `subject_id` valid for `ttl` from now
    pub fn issue(&self, subject_id: &str, ttl: Duration) -> Result<SessionToken, TokenError> {
        self.issue_at(subject_id, ttl, Utc::now())
    }

    /// Issue a token with the configured session lifetime
    pub fn issue_session(&self, subject_id: &str) -> Result<SessionToken, TokenError> {
        self.issue(subject_id, self.default_ttl)
    }

    /// Issue a token as of `now`
    pub fn issue_at(
        &self,
        subject_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<SessionToken, TokenError> {
        if subject_id.is_empty() {
            return Err(TokenError::InvalidInput(
                "subject must not be empty".to_string(),
            ));
        }
        let ttl_secs = i64::try_from(ttl.as_secs())
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| TokenError::InvalidInput(format!("unsupported ttl: {ttl:?}")))?;

        let iat = now.timestamp();
        let exp = iat
            .checked_add(ttl_secs)
            .ok_or_else(|| TokenError::InvalidInput(format!("unsupported ttl: {ttl:?}")))?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| TokenError::InvalidInput(format!("unsupported ttl: {ttl:?}")))?;
        let issued_at = Utc
            .timestamp_opt(iat, 0)
            .single()
            .ok_or_else(|| TokenError::InvalidInput("unsupported issue time".to_string()))?;

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject_id.to_string(),
            iat,
            exp,
        };
        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)?;

        Ok(SessionToken {
            token,
            subject_id: claims.sub,
            issued_at,
            expires_at,
        })
    }

    /// Verify a token and return the identity it asserts
    ///
    /// # Errors
    ///
    /// * `TokenError::Missing` - Empty token
    /// * `TokenError::Invalid` - Bad signature, foreign algorithm or issuer, malformed payload
    /// * `TokenError::Expired` - Signature is good but the expiry has passed
    pub fn verify(&self, token: &str) -> Result<AuthenticatedIdentity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as of `now`
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedIdentity, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| {
                tracing::debug!(error = %e, "Session token rejected");
                TokenError::Invalid
            })?
            .claims;

        if claims.sub.is_empty() {
            return Err(TokenError::Invalid);
        }
        if now.timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(AuthenticatedIdentity {
            subject_id: claims.sub,
        })
    }

    /// Signature, algorithm and issuer checks; expiry is checked against the
    /// caller-supplied clock instead of the library's
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss"]);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-hs256";
    const HOUR: Duration = Duration::from_secs(3600);

    fn service() -> TokenService {
        TokenService::new(SECRET, "userbase", HOUR).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = service();
        let issued = tokens.issue("user-1", HOUR).expect("Failed to issue token");

        assert_eq!(issued.subject_id, "user-1");
        assert_eq!(issued.expires_at - issued.issued_at, ChronoDuration::hours(1));

        let identity = tokens.verify(&issued.token).expect("Failed to verify token");
        assert_eq!(identity.subject_id, "user-1");
    }

    #[test]
    fn test_verification_is_repeatable() {
        let tokens = service();
        let issued = tokens.issue_session("user-1").unwrap();

        for _ in 0..3 {
            assert_eq!(tokens.verify(&issued.token).unwrap().subject_id, "user-1");
        }
    }

    #[test]
    fn test_expiry_timeline() {
        let tokens = service();
        let issued = tokens.issue_at("u1", HOUR, t0()).unwrap();

        let at_30 = tokens
            .verify_at(&issued.token, t0() + ChronoDuration::minutes(30))
            .unwrap();
        assert_eq!(at_30.subject_id, "u1");

        // exp == now is still valid
        assert!(tokens
            .verify_at(&issued.token, t0() + ChronoDuration::hours(1))
            .is_ok());

        let at_61 = tokens.verify_at(&issued.token, t0() + ChronoDuration::minutes(61));
        assert!(matches!(at_61, Err(TokenError::Expired)));
    }

    #[test]
    fn test_expired_token_with_wall_clock() {
        let tokens = service();
        let issued = tokens
            .issue_at("u1", HOUR, Utc::now() - ChronoDuration::hours(2))
            .unwrap();

        assert!(matches!(tokens.verify(&issued.token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_secret() {
        let tokens1 = TokenService::new("secret-one-secret-one-secret-one!", "userbase", HOUR).unwrap();
        let tokens2 = TokenService::new("secret-two-secret-two-secret-two!", "userbase", HOUR).unwrap();

        let issued = tokens1.issue("u1", HOUR).unwrap();
        assert!(matches!(tokens2.verify(&issued.token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_wrong_secret_beats_expiry() {
        let tokens1 = TokenService::new("secret-one-secret-one-secret-one!", "userbase", HOUR).unwrap();
        let tokens2 = TokenService::new("secret-two-secret-two-secret-two!", "userbase", HOUR).unwrap();

        let issued = tokens1.issue_at("u1", HOUR, t0()).unwrap();
        let result = tokens2.verify_at(&issued.token, t0() + ChronoDuration::hours(5));
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let tokens = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: "userbase".to_string(),
            sub: "u1".to_string(),
            iat: now,
            exp: now + 3600,
        };

        // Same secret, different HMAC algorithm
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(tokens.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let tokens = service();
        let other = TokenService::new(SECRET, "someone-else", HOUR).unwrap();

        let issued = other.issue("u1", HOUR).unwrap();
        assert!(matches!(tokens.verify(&issued.token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_missing_and_malformed_tokens() {
        let tokens = service();
        assert!(matches!(tokens.verify(""), Err(TokenError::Missing)));
        assert!(matches!(tokens.verify("   "), Err(TokenError::Missing)));
        assert!(matches!(
            tokens.verify("invalid.token.here"),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(tokens.verify("garbage"), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let tokens = service();
        let issued = tokens.issue("u1", HOUR).unwrap();
        let forged = tokens.issue("u2", HOUR).unwrap();
        let forged_payload = forged.token.split('.').nth(1).unwrap().to_string();

        // u1's header and signature around u2's payload
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        parts[1] = &forged_payload;

        assert!(matches!(
            tokens.verify(&parts.join(".")),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_unrepresentable_ttl_is_configuration_error() {
        for ttl in [
            Duration::ZERO,
            Duration::from_secs(9_000_000_000_000),
            Duration::from_secs(u64::MAX),
        ] {
            assert!(matches!(
                TokenService::new(SECRET, "userbase", ttl),
                Err(ConfigError::InvalidValue { ref key, .. }) if key == "JWT_TTL_SECS"
            ));
        }

        let config = AuthConfig {
            jwt_secret: Some(SECRET.to_string()),
            token_ttl_secs: 9_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(
            TokenService::from_config(&config),
            Err(ConfigError::InvalidValue { .. })
        ));

        // A ten-year session is still fine
        assert!(TokenService::new(SECRET, "userbase", Duration::from_secs(315_360_000)).is_ok());
    }

    #[test]
    fn test_missing_secret_is_configuration_error() {
        assert!(matches!(
            TokenService::new("", "userbase", HOUR),
            Err(ConfigError::MissingRequired(_))
        ));

        let config = AuthConfig::default();
        assert!(matches!(
            TokenService::from_config(&config),
            Err(ConfigError::MissingRequired(_))
        ));

        let config = AuthConfig {
            jwt_secret: Some(SECRET.to_string()),
            ..Default::default()
        };
        let tokens = TokenService::from_config(&config).unwrap();
        assert_eq!(tokens.default_ttl(), HOUR);
    }

    #[test]
    fn test_invalid_issue_requests() {
        let tokens = service();
        assert!(matches!(
            tokens.issue("", HOUR),
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            tokens.issue("u1", Duration::ZERO),
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            tokens.issue("u1", Duration::from_secs(u64::MAX)),
            Err(TokenError::InvalidInput(_))
        ));
    }
}
