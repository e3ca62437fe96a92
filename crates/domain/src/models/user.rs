//! User accounts and authentication DTOs.
//!
//! Credentials live with the identity provider; the local `users` row mirrors
//! the provider account and owns all tenant content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::validation::{validate_password, validate_username};
use uuid::Uuid;
use validator::Validate;

/// A tenant account mirrored from the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct User {
    pub id: Uuid,
    pub provider_user_id: Uuid,
    pub email: String,
    pub username: String,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub avatar_url: Option<String>,
    pub user_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The caller of a protected route, resolved from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Local user id (tenant id).
    pub user_id: Uuid,
    pub provider_user_id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn from_user(user: &User, role: impl Into<String>) -> Self {
        Self {
            user_id: user.id,
            provider_user_id: user.provider_user_id,
            email: user.email.clone(),
            is_active: user.is_active,
            role: role.into(),
        }
    }
}

/// Derives a username for accounts created outside the sign-up endpoint.
///
/// Uses the email local part reduced to `[a-z0-9_]`, prefixed with `u` when it
/// does not start with a letter, and suffixed with the first eight hex digits
/// of the provider id.
pub fn fallback_username(email: &str, provider_user_id: Uuid) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c == '_' || c == '.' || c == '-' || c == '+' {
                Some('_')
            } else {
                None
            }
        })
        .take(16)
        .collect();

    if !base.starts_with(|c: char| c.is_ascii_alphabetic()) {
        base.insert(0, 'u');
    }

    let suffix: String = provider_user_id.simple().to_string().chars().take(8).collect();
    format!("{}_{}", base, suffix)
}

/// Request body for `POST /auth/signup`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(custom(function = "validate_password"))]
    pub password: String,

    #[validate(custom(function = "validate_username"))]
    pub username: String,
}

impl SignUpRequest {
    /// Trims the username and lowercases the email before validation.
    pub fn normalized(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self
    }
}

/// Request body for `POST /auth/signin`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Request body for `POST /auth/resend-verification`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Response for a successful sign-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub message: String,
    pub user_id: Uuid,
    pub email: String,
    pub requires_email_confirmation: bool,
}

impl SignUpResponse {
    pub const CONFIRMATION_REQUIRED: &'static str =
        "Account created successfully. Please check your email to verify your account.";
    pub const CREATED: &'static str = "Account created successfully.";

    pub fn new(user_id: Uuid, email: String, requires_email_confirmation: bool) -> Self {
        let message = if requires_email_confirmation {
            Self::CONFIRMATION_REQUIRED
        } else {
            Self::CREATED
        };
        Self {
            message: message.to_string(),
            user_id,
            email,
            requires_email_confirmation,
        }
    }
}

/// Minimal user info returned with a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
}

/// Response for a successful sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: SessionUser,
}

/// Generic message response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{faker::internet::en::SafeEmail, Fake};

    fn signup(email: &str, password: &str, username: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            username: username.to_string(),
        }
    }

    #[test]
    fn test_signup_request_valid() {
        let email: String = SafeEmail().fake();
        assert!(signup(&email, "Secret123", "stmarys").validate().is_ok());
    }

    #[test]
    fn test_signup_request_invalid_fields() {
        let errors = signup("not-an-email", "weak", "1x")
            .validate()
            .unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("username"));
    }

    #[test]
    fn test_signup_request_normalized() {
        let req = signup(" Owner@Example.COM ", "Secret123", "  bakery_01 ").normalized();
        assert_eq!(req.email, "owner@example.com");
        assert_eq!(req.username, "bakery_01");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_signin_request_requires_password() {
        let req = SignInRequest {
            email: "owner@example.com".into(),
            password: String::new(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_signup_response_messages() {
        let id = Uuid::new_v4();
        let pending = SignUpResponse::new(id, "a@b.co".into(), true);
        assert_eq!(pending.message, SignUpResponse::CONFIRMATION_REQUIRED);

        let active = SignUpResponse::new(id, "a@b.co".into(), false);
        assert_eq!(active.message, "Account created successfully.");
        assert!(!active.requires_email_confirmation);
    }

    #[test]
    fn test_fallback_username() {
        let id = Uuid::parse_str("3f2a9c4e-0000-4000-8000-000000000000").unwrap();
        assert_eq!(fallback_username("john.doe@example.com", id), "john_doe_3f2a9c4e");
        assert_eq!(fallback_username("42@example.com", id), "u42_3f2a9c4e");
        assert!(shared::validation::validate_username(&fallback_username("x@y.z", id)).is_ok());
    }
}
