//! Custom Axum extractors.

pub mod tenant;
pub mod user_auth;

pub use tenant::TenantQuery;
pub use user_auth::UserAuth;
