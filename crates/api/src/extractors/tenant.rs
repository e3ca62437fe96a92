//! Tenant selection for public endpoints.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
struct RawTenant {
    user_id: Option<String>,
}

/// The tenant named by the `user_id` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantQuery(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for TenantQuery
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawTenant>::try_from_uri(&parts.uri)
            .map_err(|_| ApiError::BadRequest("Invalid query string".to_string()))?;

        let value = raw
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::validation("user_id query parameter is required"))?;

        Uuid::parse_str(value)
            .map(TenantQuery)
            .map_err(|_| ApiError::validation("user_id must be a valid UUID"))
    }
}
