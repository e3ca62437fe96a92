//! Bearer token authentication middleware.
//!
//! Verifies the identity provider's access token, mirrors the account into the
//! local `users` table and stores the resulting [`AuthenticatedUser`] in the
//! request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use domain::models::user::{fallback_username, AuthenticatedUser, User};
use persistence::entities::UserEntity;
use persistence::repositories::{user::is_username_conflict, UserRepository};
use shared::jwt::ProviderClaims;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::TokenError;

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Middleware that requires a valid provider access token.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = match req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
    {
        Some(token) => token.to_string(),
        None => {
            return ApiError::Unauthorized("Missing Authorization header".to_string())
                .into_response()
        }
    };

    let claims = match state.token_verifier.verify(&token).await {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            return ApiError::Unauthorized("Token has expired".to_string()).into_response()
        }
        Err(TokenError::Invalid) => {
            debug!("Access token rejected");
            return ApiError::Unauthorized("Invalid authentication token".to_string())
                .into_response();
        }
        Err(TokenError::Unavailable(reason)) => {
            error!(reason = %reason, "Could not load signing keys");
            return ApiError::ServiceUnavailable("Authentication service unavailable".to_string())
                .into_response();
        }
    };

    let user = match sync_user(&state, &claims).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    if !user.is_active {
        warn!(user_id = %user.id, "Disabled account attempted access");
        return ApiError::Forbidden("Account is disabled".to_string()).into_response();
    }

    req.extensions_mut()
        .insert(AuthenticatedUser::from_user(&user, claims.role_or_default()));
    next.run(req).await
}

/// Creates or refreshes the local user behind the token's subject.
async fn sync_user(state: &AppState, claims: &ProviderClaims) -> Result<User, ApiError> {
    let provider_user_id = claims
        .provider_user_id()
        .map_err(|_| ApiError::Unauthorized("Invalid authentication token".to_string()))?;

    let email = claims
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid authentication token".to_string()))?
        .to_lowercase();

    let repo = UserRepository::new(state.pool.clone());
    let entity = mirror_provider_user(
        &repo,
        provider_user_id,
        &email,
        claims.username_hint(),
        None,
    )
    .await?;

    Ok(entity.into())
}

/// Inserts or refreshes the local mirror of a provider account.
///
/// New rows take the provider's username hint. When that name already belongs
/// to another account the email-derived fallback is stored instead. An
/// existing row keeps its username.
pub(crate) async fn mirror_provider_user(
    repo: &UserRepository,
    provider_user_id: Uuid,
    email: &str,
    username_hint: Option<&str>,
    is_email_verified: Option<bool>,
) -> Result<UserEntity, ApiError> {
    let fallback = fallback_username(email, provider_user_id);
    let Some(hint) = username_hint else {
        return Ok(repo
            .upsert_from_provider(provider_user_id, email, &fallback, is_email_verified)
            .await?);
    };

    match repo
        .upsert_from_provider(provider_user_id, email, hint, is_email_verified)
        .await
    {
        Err(e) if is_username_conflict(&e) => {
            debug!(
                provider_user_id = %provider_user_id,
                username = %fallback,
                "Username hint already taken, using fallback"
            );
            Ok(repo
                .upsert_from_provider(provider_user_id, email, &fallback, is_email_verified)
                .await?)
        }
        result => Ok(result?),
    }
}
