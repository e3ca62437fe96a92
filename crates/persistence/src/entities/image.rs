//! Image entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the images table.
#[derive(Debug, Clone, FromRow)]
pub struct ImageEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub album_id: Uuid,
    pub image_url: String,
    pub slug: String,
    pub width: i32,
    pub height: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ImageEntity> for domain::models::Image {
    fn from(entity: ImageEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            album_id: entity.album_id,
            image_url: entity.image_url,
            slug: entity.slug,
            width: entity.width,
            height: entity.height,
            created_at: entity.created_at,
        }
    }
}
