//! Account service layer
//!
//! Provides business logic for registration, login and profile management.
//! Orchestrates the password hasher, the token service and the account store;
//! handlers only translate HTTP into these calls.

use super::password::{validate_password_strength, PasswordError, PasswordHasher};
use super::token::{AuthenticatedIdentity, SessionToken, TokenService};
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use userbase_core::{
    normalize_email, normalize_username, Account, AccountPublic, AccountStore, AccountUpdate,
    HashedCredential, NewAccount,
};

/// Account registration request
///
/// Fields default to empty so a missing field is reported as a validation
/// error rather than a body parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Profile update request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Session token as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

impl From<SessionToken> for TokenResponse {
    fn from(token: SessionToken) -> Self {
        Self {
            expires_in: (token.expires_at - token.issued_at).num_seconds(),
            access_token: token.token,
            token_type: "Bearer".to_string(),
            expires_at: token.expires_at,
        }
    }
}

/// Authentication response with the account and a fresh session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: AccountPublic,
    pub token: TokenResponse,
}

/// Account service
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
    password_min_length: usize,
    /// Verified against when the email is unknown, so both login failures cost one hash
    dummy_credential: HashedCredential,
}

impl AccountService {
    /// Create a new account service
    ///
    /// Hashes a placeholder password with the configured parameters, so this
    /// fails when those parameters cannot hash.
    pub fn new(
        store: Arc<dyn AccountStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
        password_min_length: usize,
    ) -> Result<Self, PasswordError> {
        let dummy_credential = hasher.hash("dummy-password")?;

        Ok(Self {
            store,
            hasher,
            tokens,
            password_min_length,
            dummy_credential,
        })
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new account and start a session for it
    ///
    /// # Returns
    ///
    /// * `Ok(AuthResponse)` - Created account and session token
    /// * `Err(AppError::BadRequest)` - Missing fields, bad email, weak password
    /// * `Err(AppError::Conflict)` - Email or username already taken
    pub async fn register(
        &self,
        request: RegisterRequest,
        context: &AuditContext,
    ) -> Result<AuthResponse, AppError> {
        let email = normalize_email(&request.email);
        let result = self.try_register(request, &email).await;

        match &result {
            Ok(response) => {
                tracing::info!(account_id = %response.user.id, "Account registered");
                audit_log(
                    &AuditEvent::RegistrationSuccess {
                        account_id: response.user.id.clone(),
                        email,
                    },
                    context,
                );
            }
            Err(e) => audit_log(
                &AuditEvent::RegistrationFailure {
                    email,
                    reason: e.to_string(),
                },
                context,
            ),
        }

        result
    }

    async fn try_register(
        &self,
        request: RegisterRequest,
        email: &str,
    ) -> Result<AuthResponse, AppError> {
        let username = normalize_username(&request.username);

        if username.is_empty() || email.is_empty() || request.password.is_empty() {
            return Err(AppError::BadRequest(
                "Missing required fields (username, email, or password)".to_string(),
            ));
        }
        validate_email(email)?;
        validate_password_strength(&request.password, self.password_min_length)?;

        let taken = self.store.find_by_email(email).await?.is_some()
            || self.store.find_by_username(&username).await?.is_some();
        if taken {
            return Err(AppError::Conflict(
                "A user with this email or username already exists".to_string(),
            ));
        }

        let password_hash = self.hasher.hash_blocking(request.password).await?;
        let account = self
            .store
            .create(NewAccount {
                username,
                email: email.to_string(),
                password_hash,
            })
            .await?;

        match self.start_session(&account) {
            Ok(response) => Ok(response),
            Err(e) => {
                // Leave no account behind that the client was never told about
                if let Err(rollback) = self.store.delete_by_id(&account.id).await {
                    tracing::error!(account_id = %account.id, error = %rollback, "Failed to roll back registration");
                }
                Err(e)
            }
        }
    }

    /// Check credentials and start a session
    ///
    /// An unknown email and a wrong password produce the same
    /// `AppError::InvalidCredentials`.
    pub async fn login(
        &self,
        request: LoginRequest,
        context: &AuditContext,
    ) -> Result<AuthResponse, AppError> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(AppError::BadRequest(
                "Email and password are required".to_string(),
            ));
        }

        let Some(account) = self.store.find_by_email(&email).await? else {
            self.hasher
                .verify_blocking(self.dummy_credential.clone(), request.password)
                .await;
            audit_log(
                &AuditEvent::LoginFailure {
                    email,
                    reason: "unknown_account".to_string(),
                },
                context,
            );
            return Err(AppError::InvalidCredentials);
        };

        let matches = self
            .hasher
            .verify_blocking(account.password_hash.clone(), request.password)
            .await;
        if !matches {
            audit_log(
                &AuditEvent::LoginFailure {
                    email,
                    reason: "wrong_password".to_string(),
                },
                context,
            );
            return Err(AppError::InvalidCredentials);
        }

        let response = self.start_session(&account)?;
        audit_log(
            &AuditEvent::LoginSuccess {
                account_id: account.id,
                email,
            },
            context,
        );

        Ok(response)
    }

    /// Read the caller's own profile
    pub async fn profile(&self, identity: &AuthenticatedIdentity) -> Result<AccountPublic, AppError> {
        self.store
            .find_by_id(&identity.subject_id)
            .await?
            .map(|account| account.to_public())
            .ok_or_else(|| AppError::NotFound("Account".to_string()))
    }

    /// Update the caller's own profile
    ///
    /// A new password is validated and re-hashed before it reaches the store.
    pub async fn update_profile(
        &self,
        identity: &AuthenticatedIdentity,
        request: UpdateProfileRequest,
        context: &AuditContext,
    ) -> Result<AccountPublic, AppError> {
        let mut update = AccountUpdate::default();
        let mut fields = Vec::new();

        if let Some(username) = request.username {
            let username = normalize_username(&username);
            if username.is_empty() {
                return Err(AppError::BadRequest("Username must not be empty".to_string()));
            }
            update.username = Some(username);
            fields.push("username".to_string());
        }
        if let Some(email) = request.email {
            let email = normalize_email(&email);
            validate_email(&email)?;
            update.email = Some(email);
            fields.push("email".to_string());
        }
        if let Some(password) = request.password {
            validate_password_strength(&password, self.password_min_length)?;
            update.password_hash = Some(self.hasher.hash_blocking(password).await?);
            fields.push("password".to_string());
        }

        if update.is_empty() {
            return self.profile(identity).await;
        }

        let password_changed = update.password_hash.is_some();
        let account = self
            .store
            .update_by_id(&identity.subject_id, update)
            .await?
            .ok_or_else(|| AppError::NotFound("Account".to_string()))?;

        audit_log(
            &AuditEvent::ProfileUpdated {
                account_id: account.id.clone(),
                fields,
            },
            context,
        );
        if password_changed {
            audit_log(
                &AuditEvent::PasswordChange {
                    account_id: account.id.clone(),
                },
                context,
            );
        }

        Ok(account.to_public())
    }

    /// Delete the caller's own account
    pub async fn delete_account(
        &self,
        identity: &AuthenticatedIdentity,
        context: &AuditContext,
    ) -> Result<(), AppError> {
        let account = self
            .store
            .delete_by_id(&identity.subject_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account".to_string()))?;

        tracing::info!(account_id = %account.id, "Account deleted");
        audit_log(
            &AuditEvent::AccountDeleted {
                account_id: account.id,
            },
            context,
        );

        Ok(())
    }

    fn start_session(&self, account: &Account) -> Result<AuthResponse, AppError> {
        let token = self
            .tokens
            .issue_session(&account.id)
            .map_err(|e| AppError::Internal(format!("Failed to issue session token: {e}")))?;
        Ok(AuthResponse {
            user: account.to_public(),
            token: token.into(),
        })
    }
}

fn validate_email(email: &str) -> Result<(), AppError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AppError::BadRequest("Invalid email format".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordConfig;
    use std::time::Duration;
    use userbase_core::MemoryAccountStore;

    fn service() -> AccountService {
        service_with_hasher(light_hasher())
    }

    fn light_hasher() -> PasswordHasher {
        PasswordHasher::new(&PasswordConfig {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        })
        .unwrap()
    }

    fn service_with_hasher(hasher: PasswordHasher) -> AccountService {
        let tokens = TokenService::new(
            "service-test-secret-service-test-secret",
            "userbase",
            Duration::from_secs(3600),
        )
        .unwrap();
        AccountService::new(Arc::new(MemoryAccountStore::new()), hasher, tokens, 8).unwrap()
    }

    fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn identity(id: &str) -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            subject_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service();
        let ctx = AuditContext::default();

        let registered = service
            .register(register_request(" alice ", "Alice@Example.com", "password123"), &ctx)
            .await
            .unwrap();
        assert_eq!(registered.user.username, "alice");
        assert_eq!(registered.user.email, "alice@example.com");
        assert_eq!(registered.token.token_type, "Bearer");
        assert_eq!(registered.token.expires_in, 3600);

        let identity = service.tokens().verify(&registered.token.access_token).unwrap();
        assert_eq!(identity.subject_id, registered.user.id);

        let logged_in = service
            .login(login_request("ALICE@example.com", "password123"), &ctx)
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = service();
        let ctx = AuditContext::default();

        let missing = service
            .register(register_request("", "a@example.com", "password123"), &ctx)
            .await;
        assert!(matches!(missing, Err(AppError::BadRequest(_))));

        let bad_email = service
            .register(register_request("alice", "not-an-email", "password123"), &ctx)
            .await;
        assert!(matches!(bad_email, Err(AppError::BadRequest(_))));

        let weak = service
            .register(register_request("alice", "a@example.com", "short"), &ctx)
            .await;
        assert!(matches!(weak, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_or_username() {
        let service = service();
        let ctx = AuditContext::default();

        service
            .register(register_request("alice", "alice@example.com", "password123"), &ctx)
            .await
            .unwrap();

        let same_email = service
            .register(register_request("other", "alice@example.com", "password123"), &ctx)
            .await;
        assert!(matches!(same_email, Err(AppError::Conflict(_))));

        let same_username = service
            .register(register_request("alice", "other@example.com", "password123"), &ctx)
            .await;
        assert!(matches!(same_username, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let service = service();
        let ctx = AuditContext::default();
        service
            .register(register_request("alice", "alice@example.com", "password123"), &ctx)
            .await
            .unwrap();

        let wrong_password = service
            .login(login_request("alice@example.com", "wrong-password"), &ctx)
            .await;
        let unknown_account = service
            .login(login_request("nobody@example.com", "password123"), &ctx)
            .await;

        assert!(matches!(wrong_password, Err(AppError::InvalidCredentials)));
        assert!(matches!(unknown_account, Err(AppError::InvalidCredentials)));

        let empty = service.login(login_request("alice@example.com", ""), &ctx).await;
        assert!(matches!(empty, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_unknown_account_login_still_runs_the_hasher() {
        let hasher = light_hasher();
        let service = service_with_hasher(hasher.clone());
        let ctx = AuditContext::default();
        service
            .register(register_request("alice", "alice@example.com", "password123"), &ctx)
            .await
            .unwrap();
        let before = hasher.verification_count();

        let _ = service
            .login(login_request("alice@example.com", "wrong-password"), &ctx)
            .await;
        assert_eq!(hasher.verification_count(), before + 1);

        let _ = service
            .login(login_request("nobody@example.com", "password123"), &ctx)
            .await;
        assert_eq!(hasher.verification_count(), before + 2);
    }

    #[tokio::test]
    async fn test_update_profile_rehashes_password() {
        let service = service();
        let ctx = AuditContext::default();
        let registered = service
            .register(register_request("alice", "alice@example.com", "password123"), &ctx)
            .await
            .unwrap();
        let me = identity(&registered.user.id);

        let updated = service
            .update_profile(
                &me,
                UpdateProfileRequest {
                    username: Some("alice2".to_string()),
                    password: Some("new-password-456".to_string()),
                    ..Default::default()
                },
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(updated.username, "alice2");

        let old = service
            .login(login_request("alice@example.com", "password123"), &ctx)
            .await;
        assert!(matches!(old, Err(AppError::InvalidCredentials)));

        service
            .login(login_request("alice@example.com", "new-password-456"), &ctx)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_profile_conflict_and_empty() {
        let service = service();
        let ctx = AuditContext::default();
        let alice = service
            .register(register_request("alice", "alice@example.com", "password123"), &ctx)
            .await
            .unwrap();
        service
            .register(register_request("bob", "bob@example.com", "password123"), &ctx)
            .await
            .unwrap();
        let me = identity(&alice.user.id);

        let taken = service
            .update_profile(
                &me,
                UpdateProfileRequest {
                    email: Some("BOB@example.com".to_string()),
                    ..Default::default()
                },
                &ctx,
            )
            .await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));

        let unchanged = service
            .update_profile(&me, UpdateProfileRequest::default(), &ctx)
            .await
            .unwrap();
        assert_eq!(unchanged, alice.user);
    }

    #[tokio::test]
    async fn test_profile_and_delete() {
        let service = service();
        let ctx = AuditContext::default();
        let registered = service
            .register(register_request("alice", "alice@example.com", "password123"), &ctx)
            .await
            .unwrap();
        let me = identity(&registered.user.id);

        assert_eq!(service.profile(&me).await.unwrap().email, "alice@example.com");

        service.delete_account(&me, &ctx).await.unwrap();

        assert!(matches!(service.profile(&me).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            service.delete_account(&me, &ctx).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service
                .update_profile(
                    &me,
                    UpdateProfileRequest {
                        username: Some("ghost".to_string()),
                        ..Default::default()
                    },
                    &ctx
                )
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b").is_ok());
        assert!(validate_email("@b").is_err());
        assert!(validate_email("a@").is_err());
        assert!(validate_email("ab").is_err());
    }
}
