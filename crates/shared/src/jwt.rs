//! Verification of access tokens issued by the identity provider.
//!
//! The provider signs access tokens either with a shared HS256 secret or with
//! an asymmetric key published in its JWKS. This module validates the token
//! and exposes the claims the API needs; key discovery lives in the API crate.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::validation::validate_username;

/// Default audience of provider access tokens.
pub const DEFAULT_AUDIENCE: &str = "authenticated";

/// Default leeway in seconds for clock skew tolerance.
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Claims carried by a provider access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderClaims {
    /// Provider user id.
    pub sub: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<serde_json::Value>,
}

impl ProviderClaims {
    /// Parses the subject as the provider's user UUID.
    pub fn provider_user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }

    /// Username stored in the provider's user metadata at sign-up, if it is
    /// one this service would accept.
    pub fn username_hint(&self) -> Option<&str> {
        self.user_metadata
            .as_ref()
            .and_then(|m| m.get("username"))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| validate_username(s).is_ok())
    }

    /// Role claim, defaulting to `user`.
    pub fn role_or_default(&self) -> &str {
        self.role.as_deref().unwrap_or("user")
    }
}

/// Validates provider access tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    audience: String,
    leeway_secs: u64,
    secret_key: Option<DecodingKey>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("audience", &self.audience)
            .field("leeway_secs", &self.leeway_secs)
            .field(
                "secret_key",
                &self.secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl TokenVerifier {
    /// Creates a verifier for the given audience without a shared secret.
    pub fn new(audience: impl Into<String>, leeway_secs: u64) -> Self {
        Self {
            audience: audience.into(),
            leeway_secs,
            secret_key: None,
        }
    }

    /// Enables HS256 verification with the provider's shared JWT secret.
    /// Empty secrets are ignored.
    pub fn with_secret(mut self, secret: &str) -> Self {
        if !secret.is_empty() {
            self.secret_key = Some(DecodingKey::from_secret(secret.as_bytes()));
        }
        self
    }

    /// Whether a shared secret is configured.
    pub fn has_secret(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Verifies an HS256 token with the configured shared secret.
    pub fn verify(&self, token: &str) -> Result<ProviderClaims, JwtError> {
        let key = self
            .secret_key
            .as_ref()
            .ok_or_else(|| JwtError::InvalidKey("No shared secret configured".into()))?;
        self.verify_with_key(token, key, Algorithm::HS256)
    }

    /// Verifies a token with an explicit key, e.g. one resolved from a JWKS.
    pub fn verify_with_key(
        &self,
        token: &str,
        key: &DecodingKey,
        algorithm: Algorithm,
    ) -> Result<ProviderClaims, JwtError> {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;
        validation.set_audience(&[self.audience.as_str()]);

        let data = decode::<ProviderClaims>(token, key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                ErrorKind::InvalidToken
                | ErrorKind::InvalidSignature
                | ErrorKind::InvalidAudience
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => JwtError::InvalidToken,
                _ => JwtError::DecodingError(e.to_string()),
            }
        })?;

        Ok(data.claims)
    }
}

/// Signs claims with an HS256 secret, the way the provider does for projects
/// using a shared JWT secret. Used by tests and local tooling.
pub fn encode_hs256(claims: &ProviderClaims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::EncodingError(e.to_string()))
}
