//! Identity provider abstraction.
//!
//! Sign-up, sign-in and email verification are delegated to an external
//! GoTrue-compatible auth service. The API only mirrors the resulting account
//! into its own `users` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::jwt::{encode_hs256, ProviderClaims, DEFAULT_AUDIENCE};
use shared::validation::validate_username;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use uuid::Uuid;

/// Identity provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("User already registered")]
    AlreadyRegistered,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("{0}")]
    Rejected(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Account as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl ProviderUser {
    /// Username from the account metadata, when it passes username rules.
    pub fn username_hint(&self) -> Option<&str> {
        self.user_metadata
            .get("username")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| validate_username(s).is_ok())
    }
}

/// Tokens issued by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Result of a sign-up call. `session` is absent while email confirmation is
/// pending.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: ProviderUser,
    pub session: Option<ProviderSession>,
}

/// Result of a password sign-in call.
#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub user: Option<ProviderUser>,
    pub session: Option<ProviderSession>,
}

/// External identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registers an account, storing `username` in the user metadata.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpOutcome, IdentityError>;

    /// Exchanges email and password for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome, IdentityError>;

    /// Sends the sign-up confirmation email again.
    async fn resend_verification(&self, email: &str) -> Result<(), IdentityError>;
}

#[derive(Debug, Clone)]
struct StoredAccount {
    user: ProviderUser,
    password: String,
}

/// In-process identity provider for development and testing.
///
/// Issues HS256 access tokens signed with the configured JWT secret, so tokens
/// it hands out verify exactly like the real provider's.
#[derive(Debug)]
pub struct InMemoryIdentityProvider {
    jwt_secret: String,
    auto_confirm: bool,
    token_ttl_secs: i64,
    accounts: RwLock<HashMap<String, StoredAccount>>,
}

impl InMemoryIdentityProvider {
    /// Creates a provider. With `auto_confirm` accounts can sign in right away;
    /// otherwise they must be confirmed with [`Self::confirm_email`].
    pub fn new(jwt_secret: impl Into<String>, auto_confirm: bool) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            auto_confirm,
            token_ttl_secs: 3600,
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Marks an account as confirmed. Returns false when unknown.
    pub fn confirm_email(&self, email: &str) -> bool {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        match accounts.get_mut(&email.to_lowercase()) {
            Some(account) => {
                account.user.email_confirmed_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Issues a session for a user, signed with the shared secret.
    pub fn issue_session(&self, user: &ProviderUser) -> Result<ProviderSession, IdentityError> {
        let now = Utc::now().timestamp();
        let claims = ProviderClaims {
            sub: user.id.to_string(),
            exp: now + self.token_ttl_secs,
            iat: Some(now),
            aud: Some(serde_json::Value::String(DEFAULT_AUDIENCE.to_string())),
            email: user.email.clone(),
            role: Some(DEFAULT_AUDIENCE.to_string()),
            user_metadata: Some(user.user_metadata.clone()),
        };
        let access_token = encode_hs256(&claims, &self.jwt_secret)
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        Ok(ProviderSession {
            access_token,
            refresh_token: Uuid::new_v4().simple().to_string(),
            expires_in: self.token_ttl_secs,
            token_type: default_token_type(),
        })
    }
}

#[async_trait::async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpOutcome, IdentityError> {
        let key = email.to_lowercase();
        let user = {
            let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
            if accounts.contains_key(&key) {
                return Err(IdentityError::AlreadyRegistered);
            }
            let user = ProviderUser {
                id: Uuid::new_v4(),
                email: Some(key.clone()),
                email_confirmed_at: self.auto_confirm.then(Utc::now),
                user_metadata: serde_json::json!({ "username": username }),
            };
            accounts.insert(
                key,
                StoredAccount {
                    user: user.clone(),
                    password: password.to_string(),
                },
            );
            user
        };

        let session = if self.auto_confirm {
            Some(self.issue_session(&user)?)
        } else {
            None
        };

        tracing::info!(provider_user_id = %user.id, "Mock: registered identity");
        Ok(SignUpOutcome { user, session })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome, IdentityError> {
        let account = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&email.to_lowercase())
            .cloned();

        match account {
            Some(account) if account.password == password => {
                if account.user.email_confirmed_at.is_none() {
                    return Ok(SignInOutcome {
                        user: Some(account.user),
                        session: None,
                    });
                }
                let session = self.issue_session(&account.user)?;
                Ok(SignInOutcome {
                    user: Some(account.user),
                    session: Some(session),
                })
            }
            _ => Err(IdentityError::InvalidCredentials),
        }
    }

    async fn resend_verification(&self, email: &str) -> Result<(), IdentityError> {
        let known = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&email.to_lowercase());
        if known {
            tracing::info!("Mock: would resend verification email");
            Ok(())
        } else {
            Err(IdentityError::Rejected("User not found".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::jwt::TokenVerifier;

    const SECRET: &str = "local-development-secret-with-32-chars!";

    #[tokio::test]
    async fn test_sign_up_requires_confirmation() {
        let provider = InMemoryIdentityProvider::new(SECRET, false);
        let outcome = provider
            .sign_up("Owner@Example.com", "Secret123", "stmarys")
            .await
            .unwrap();
        assert!(outcome.session.is_none());
        assert_eq!(outcome.user.email.as_deref(), Some("owner@example.com"));
        assert_eq!(outcome.user.username_hint(), Some("stmarys"));

        let signin = provider.sign_in("owner@example.com", "Secret123").await.unwrap();
        assert!(signin.user.is_some());
        assert!(signin.session.is_none());
    }

    #[tokio::test]
    async fn test_sign_up_duplicate() {
        let provider = InMemoryIdentityProvider::new(SECRET, true);
        provider.sign_up("a@example.com", "Secret123", "alice").await.unwrap();
        let err = provider
            .sign_up("A@example.com", "Secret123", "alice2")
            .await
            .unwrap_err();
        assert_eq!(err, IdentityError::AlreadyRegistered);
    }

    #[tokio::test]
    async fn test_sign_in_after_confirmation_issues_verifiable_token() {
        let provider = InMemoryIdentityProvider::new(SECRET, false);
        let outcome = provider.sign_up("b@example.com", "Secret123", "bob").await.unwrap();
        assert!(provider.confirm_email("b@example.com"));

        let signin = provider.sign_in("b@example.com", "Secret123").await.unwrap();
        let session = signin.session.unwrap();
        assert_eq!(session.token_type, "bearer");

        let claims = TokenVerifier::new(DEFAULT_AUDIENCE, 0)
            .with_secret(SECRET)
            .verify(&session.access_token)
            .unwrap();
        assert_eq!(claims.provider_user_id().unwrap(), outcome.user.id);
        assert_eq!(claims.username_hint(), Some("bob"));
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let provider = InMemoryIdentityProvider::new(SECRET, true);
        provider.sign_up("c@example.com", "Secret123", "carol").await.unwrap();
        assert_eq!(
            provider.sign_in("c@example.com", "Wrong1234").await.unwrap_err(),
            IdentityError::InvalidCredentials
        );
        assert_eq!(
            provider.sign_in("nobody@example.com", "Secret123").await.unwrap_err(),
            IdentityError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn test_resend_verification() {
        let provider = InMemoryIdentityProvider::new(SECRET, false);
        provider.sign_up("d@example.com", "Secret123", "dave").await.unwrap();
        assert!(provider.resend_verification("d@example.com").await.is_ok());
        assert!(provider.resend_verification("x@example.com").await.is_err());
    }

    #[test]
    fn test_provider_user_deserializes_gotrue_shape() {
        let user: ProviderUser = serde_json::from_str(
            r#"{"id":"9b2f8a52-3c1e-4c55-9d1e-2f6c3c0b7a11","aud":"authenticated",
                "email":"e@example.com","email_confirmed_at":null,
                "user_metadata":{"username":"erin"},"app_metadata":{"provider":"email"}}"#,
        )
        .unwrap();
        assert!(user.email_confirmed_at.is_none());
        assert_eq!(user.username_hint(), Some("erin"));
    }

    #[test]
    fn test_provider_user_hint_skips_invalid_username() {
        let mut user: ProviderUser = serde_json::from_str(
            r#"{"id":"9b2f8a52-3c1e-4c55-9d1e-2f6c3c0b7a11","user_metadata":{"username":"9lives"}}"#,
        )
        .unwrap();
        assert_eq!(user.username_hint(), None);

        user.user_metadata = serde_json::json!({ "username": "x".repeat(31) });
        assert_eq!(user.username_hint(), None);
    }
}
