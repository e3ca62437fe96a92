//! Account routes: sign-up, sign-in and verification email resend.
//!
//! Credentials never touch this service's database. Each call is forwarded to
//! the identity provider and the resulting account is mirrored into `users`.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::user::{
    MessageResponse, ResendVerificationRequest, SessionUser, SignInRequest, SignInResponse,
    SignUpRequest, SignUpResponse,
};
use domain::services::{IdentityError, ProviderUser};
use persistence::repositories::UserRepository;
use tracing::{info, warn};
use validator::Validate;

use crate::app::AppState;
use crate::error::{ApiError, EMAIL_NOT_CONFIRMED_MESSAGE};
use crate::middleware::user_auth::mirror_provider_user;

/// Message returned once a verification email has been requested.
pub const VERIFICATION_SENT_MESSAGE: &str = "Verification email sent. Please check your inbox.";

/// Register a new account.
///
/// POST /api/v1/auth/signup
pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SignUpResponse>), ApiError> {
    let request = request.normalized();
    request.validate()?;

    let users = UserRepository::new(state.pool.clone());
    if users.find_by_username(&request.username).await?.is_some() {
        return Err(ApiError::Conflict("Username is already taken".to_string()));
    }

    let outcome = state
        .identity
        .sign_up(&request.email, &request.password, &request.username)
        .await
        .map_err(sign_up_error)?;

    let email = provider_email(&outcome.user, &request.email);
    let user = users
        .upsert_from_provider(
            outcome.user.id,
            &email,
            &request.username,
            Some(outcome.user.email_confirmed_at.is_some()),
        )
        .await?;

    let requires_confirmation = outcome.session.is_none();
    info!(
        user_id = %user.id,
        requires_confirmation,
        "Account registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse::new(user.id, user.email, requires_confirmation)),
    ))
}

/// Exchange email and password for a session.
///
/// POST /api/v1/auth/signin
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, ApiError> {
    request.validate()?;
    let email = request.email.trim().to_lowercase();

    let outcome = state.identity.sign_in(&email, &request.password).await?;

    let (provider_user, session) = match (outcome.user, outcome.session) {
        (Some(user), Some(session)) => (user, session),
        (Some(_), None) => {
            return Err(ApiError::Unauthorized(EMAIL_NOT_CONFIRMED_MESSAGE.to_string()))
        }
        (None, _) => return Err(ApiError::Unauthorized("Invalid credentials".to_string())),
    };

    let email = provider_email(&provider_user, &email);
    let users = UserRepository::new(state.pool.clone());
    let user = mirror_provider_user(
        &users,
        provider_user.id,
        &email,
        provider_user.username_hint(),
        Some(provider_user.email_confirmed_at.is_some()),
    )
    .await?;

    if !user.is_active {
        warn!(user_id = %user.id, "Sign-in attempt on disabled account");
        return Err(ApiError::Forbidden("Account is disabled".to_string()));
    }

    info!(user_id = %user.id, "User signed in");

    Ok(Json(SignInResponse {
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        token_type: session.token_type,
        expires_in: session.expires_in,
        user: SessionUser {
            id: user.id,
            email: user.email,
        },
    }))
}

/// Send the sign-up confirmation email again.
///
/// POST /api/v1/auth/resend-verification
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(request): Json<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;
    let email = request.email.trim().to_lowercase();

    state
        .identity
        .resend_verification(&email)
        .await
        .map_err(resend_error)?;

    Ok(Json(MessageResponse::new(VERIFICATION_SENT_MESSAGE)))
}

fn provider_email(user: &ProviderUser, requested: &str) -> String {
    user.email
        .as_deref()
        .filter(|e| !e.is_empty())
        .unwrap_or(requested)
        .to_lowercase()
}

fn sign_up_error(err: IdentityError) -> ApiError {
    match err {
        IdentityError::Rejected(msg) => ApiError::BadRequest(format!("Sign up failed: {}", msg)),
        other => other.into(),
    }
}

fn resend_error(err: IdentityError) -> ApiError {
    match err {
        IdentityError::Rejected(msg) => {
            ApiError::BadRequest(format!("Could not resend verification email: {}", msg))
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ALREADY_REGISTERED_MESSAGE;
    use uuid::Uuid;

    #[test]
    fn test_sign_up_error_mapping() {
        match sign_up_error(IdentityError::Rejected("Signups not allowed".into())) {
            ApiError::BadRequest(msg) => assert_eq!(msg, "Sign up failed: Signups not allowed"),
            other => panic!("unexpected: {:?}", other),
        }
        match sign_up_error(IdentityError::AlreadyRegistered) {
            ApiError::Conflict(msg) => assert_eq!(msg, ALREADY_REGISTERED_MESSAGE),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            sign_up_error(IdentityError::Unavailable("timeout".into())),
            ApiError::BadGateway(_)
        ));
    }

    #[test]
    fn test_resend_error_mapping() {
        match resend_error(IdentityError::Rejected("For security purposes".into())) {
            ApiError::BadRequest(msg) => {
                assert_eq!(msg, "Could not resend verification email: For security purposes")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_provider_email_prefers_provider_value() {
        let mut user = ProviderUser {
            id: Uuid::new_v4(),
            email: Some("Owner@Example.com".into()),
            email_confirmed_at: None,
            user_metadata: serde_json::Value::Null,
        };
        assert_eq!(provider_email(&user, "other@example.com"), "owner@example.com");

        user.email = None;
        assert_eq!(provider_email(&user, "other@example.com"), "other@example.com");
    }
}
