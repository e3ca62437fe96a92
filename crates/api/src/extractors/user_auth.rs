//! Authenticated caller extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::models::AuthenticatedUser;
use std::ops::Deref;

use crate::error::ApiError;

/// The caller of a protected route.
///
/// Populated by the `require_user_auth` middleware; extracting it on a route
/// without that middleware is rejected with 401.
#[derive(Debug, Clone)]
pub struct UserAuth(pub AuthenticatedUser);

impl Deref for UserAuth {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for UserAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(UserAuth)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))
    }
}
