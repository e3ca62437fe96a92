//! Verification of provider access tokens.
//!
//! HS256 tokens are checked with the shared JWT secret. Asymmetric tokens
//! (ES256/RS256) are checked against the provider's JWKS, cached for an hour
//! and refetched when an unknown `kid` shows up. Refetches are at most one per
//! minute, so a stream of tokens with made-up `kid`s cannot hammer the
//! provider.

use chrono::Utc;
use jsonwebtoken::{decode_header, jwk::JwkSet, Algorithm, DecodingKey};
use shared::jwt::{JwtError, ProviderClaims, TokenVerifier};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::ProviderConfig;

/// Cache TTL in seconds (1 hour)
const CACHE_TTL_SECS: i64 = 3600;

/// Minimum time between two JWKS fetches.
const JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

/// Error type for access token verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid authentication token")]
    Invalid,

    #[error("Authentication service unavailable: {0}")]
    Unavailable(String),
}

impl From<JwtError> for TokenError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenExpired => TokenError::Expired,
            _ => TokenError::Invalid,
        }
    }
}

/// Cached JWKS with timestamp.
struct CachedJwks {
    keys: JwkSet,
    fetched_at: i64,
}

#[derive(Default)]
struct JwksState {
    cached: Option<CachedJwks>,
    /// Start of the last fetch, successful or not.
    last_fetch: Option<Instant>,
}

impl JwksState {
    /// Resolves `kid` without network access. `None` means a fetch is due.
    ///
    /// During the cooldown after a fetch the cache is authoritative, stale or
    /// not: unknown keys are rejected and a missing cache reports the provider
    /// as unavailable.
    fn lookup(&self, kid: &str, cooldown: Duration) -> Option<Result<DecodingKey, TokenError>> {
        let fresh = self
            .cached
            .as_ref()
            .is_some_and(|c| Utc::now().timestamp() - c.fetched_at < CACHE_TTL_SECS);
        let cooling = self.last_fetch.is_some_and(|at| at.elapsed() < cooldown);
        if !fresh && !cooling {
            return None;
        }

        match self.cached.as_ref().and_then(|c| c.keys.find(kid)) {
            Some(jwk) => Some(DecodingKey::from_jwk(jwk).map_err(|_| TokenError::Invalid)),
            None if cooling && self.cached.is_some() => Some(Err(TokenError::Invalid)),
            None if cooling => Some(Err(TokenError::Unavailable(
                "JWKS fetch failed recently".to_string(),
            ))),
            None => None,
        }
    }
}

/// Verifies bearer tokens issued by the identity provider.
pub struct AccessTokenVerifier {
    verifier: TokenVerifier,
    jwks_url: String,
    http_client: reqwest::Client,
    state: Arc<RwLock<JwksState>>,
}

impl AccessTokenVerifier {
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            verifier: TokenVerifier::new(&config.jwt_audience, config.jwt_leeway_secs)
                .with_secret(&config.jwt_secret),
            jwks_url: config.jwks_url(),
            http_client,
            state: Arc::new(RwLock::new(JwksState::default())),
        })
    }

    /// Verifies a token and returns its claims.
    pub async fn verify(&self, token: &str) -> Result<ProviderClaims, TokenError> {
        let header = decode_header(token).map_err(|_| TokenError::Invalid)?;

        match header.alg {
            Algorithm::HS256 => {
                if !self.verifier.has_secret() {
                    return Err(TokenError::Invalid);
                }
                Ok(self.verifier.verify(token)?)
            }
            alg @ (Algorithm::ES256 | Algorithm::RS256) => {
                let kid = header.kid.ok_or(TokenError::Invalid)?;
                let key = self.decoding_key(&kid).await?;
                Ok(self.verifier.verify_with_key(token, &key, alg)?)
            }
            _ => Err(TokenError::Invalid),
        }
    }

    /// Gets the key for `kid`, refreshing the cached JWKS when it is stale or
    /// does not know the key and no fetch happened within the cooldown.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, TokenError> {
        if let Some(result) = self.state.read().await.lookup(kid, JWKS_REFRESH_COOLDOWN) {
            return result;
        }

        let mut state = self.state.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(result) = state.lookup(kid, JWKS_REFRESH_COOLDOWN) {
            return result;
        }

        debug!(kid = %kid, "Fetching JWKS");
        state.last_fetch = Some(Instant::now());
        let keys = self.fetch_jwks().await?;
        let key = keys
            .find(kid)
            .map(|jwk| DecodingKey::from_jwk(jwk).map_err(|_| TokenError::Invalid));

        state.cached = Some(CachedJwks {
            keys,
            fetched_at: Utc::now().timestamp(),
        });

        key.unwrap_or(Err(TokenError::Invalid))
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, TokenError> {
        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| TokenError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TokenError::Unavailable(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| TokenError::Unavailable(format!("Malformed JWKS: {}", e)))
    }
}
