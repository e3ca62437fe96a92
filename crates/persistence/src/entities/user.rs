//! User entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
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

impl From<UserEntity> for domain::models::User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            provider_user_id: entity.provider_user_id,
            email: entity.email,
            username: entity.username,
            is_active: entity.is_active,
            is_email_verified: entity.is_email_verified,
            avatar_url: entity.avatar_url,
            user_metadata: entity.user_metadata,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
