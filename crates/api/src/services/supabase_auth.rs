//! GoTrue (Supabase Auth) client.
//!
//! Implements [`IdentityProvider`] over the provider's REST API using the
//! project's anon key.

use async_trait::async_trait;
use domain::services::{
    IdentityError, IdentityProvider, ProviderSession, ProviderUser, SignInOutcome, SignUpOutcome,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::ProviderConfig;

/// Identity provider backed by a GoTrue server.
pub struct SupabaseAuthClient {
    http_client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

/// Token grant response. Sign-up returns this shape when confirmation is
/// disabled, and a bare user otherwise.
#[derive(Debug, Deserialize)]
struct SessionResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default = "default_token_type")]
    token_type: String,
    user: Option<ProviderUser>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl From<&SessionResponse> for ProviderSession {
    fn from(response: &SessionResponse) -> Self {
        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expires_in: response.expires_in,
            token_type: response.token_type.clone(),
        }
    }
}

/// GoTrue error payload. Older servers use `error`/`error_description`, newer
/// ones `code`/`error_code`/`msg`.
#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorResponse {
    fn message(&self) -> String {
        self.msg
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// Maps a non-success GoTrue response to an [`IdentityError`].
fn classify_error(status: reqwest::StatusCode, body: &str) -> IdentityError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.message();
    let lowered = message.to_lowercase();
    let code = parsed.error_code.as_deref().unwrap_or_default();

    if status.is_server_error() {
        return IdentityError::Unavailable(format!("{}: {}", status, message));
    }
    if code == "user_already_exists" || lowered.contains("already registered") {
        return IdentityError::AlreadyRegistered;
    }
    if code == "email_not_confirmed" || lowered.contains("email not confirmed") {
        return IdentityError::EmailNotConfirmed;
    }
    if code == "invalid_credentials" || lowered.contains("invalid login credentials") {
        return IdentityError::InvalidCredentials;
    }
    IdentityError::Rejected(message)
}

impl SupabaseAuthClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, IdentityError> {
        let response = self
            .http_client
            .post(self.endpoint(path))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(status, &text));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| IdentityError::Unavailable(format!("Malformed response: {}", e)))
    }
}

/// Splits a sign-up response into user and optional session.
fn parse_sign_up(body: serde_json::Value) -> Result<SignUpOutcome, IdentityError> {
    if body.get("access_token").is_some() {
        let response: SessionResponse = serde_json::from_value(body)
            .map_err(|e| IdentityError::Unavailable(format!("Malformed response: {}", e)))?;
        let session = ProviderSession::from(&response);
        let user = response
            .user
            .ok_or_else(|| IdentityError::Rejected("Failed to create user".to_string()))?;
        return Ok(SignUpOutcome {
            user,
            session: Some(session),
        });
    }

    let user: ProviderUser = serde_json::from_value(body)
        .map_err(|_| IdentityError::Rejected("Failed to create user".to_string()))?;
    Ok(SignUpOutcome {
        user,
        session: None,
    })
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpOutcome, IdentityError> {
        let body = self
            .post(
                "signup",
                json!({
                    "email": email,
                    "password": password,
                    "data": { "username": username },
                }),
            )
            .await?;
        parse_sign_up(body)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome, IdentityError> {
        let body = self
            .post(
                "token?grant_type=password",
                json!({ "email": email, "password": password }),
            )
            .await?;

        let response: SessionResponse = serde_json::from_value(body)
            .map_err(|e| IdentityError::Unavailable(format!("Malformed response: {}", e)))?;
        let session = ProviderSession::from(&response);
        Ok(SignInOutcome {
            user: response.user,
            session: Some(session),
        })
    }

    async fn resend_verification(&self, email: &str) -> Result<(), IdentityError> {
        self.post("resend", json!({ "type": "signup", "email": email }))
            .await
            .map(|_| ())
    }
}
