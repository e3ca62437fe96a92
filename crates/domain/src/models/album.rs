//! Photo album domain model and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::image::{Image, ImageResponse};

/// Slug used when an album title has no URL-safe characters.
pub const ALBUM_SLUG_FALLBACK: &str = "album";

/// A gallery album owned by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Album {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub slug: String,
    pub cover_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for creating an album.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAlbumRequest {
    #[validate(length(min = 3, max = 150, message = "Title must be between 3 and 150 characters"))]
    pub title: String,

    #[serde(default)]
    pub is_published: bool,
}

/// Request payload for updating an album.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAlbumRequest {
    #[validate(length(min = 3, max = 150, message = "Title must be between 3 and 150 characters"))]
    pub title: Option<String>,

    pub is_published: Option<bool>,
}

impl CreateAlbumRequest {
    /// Trims the title before validation.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self
    }
}

impl UpdateAlbumRequest {
    /// Trims the title before validation.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.map(|t| t.trim().to_string());
        self
    }
}

/// Album with its images as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub cover_url: Option<String>,
    pub is_published: bool,
    pub images: Vec<ImageResponse>,
}

impl AlbumResponse {
    /// Builds a response, keeping only the images that belong to the album.
    pub fn with_images(album: Album, images: &[Image]) -> Self {
        let images = images
            .iter()
            .filter(|img| img.album_id == album.id)
            .cloned()
            .map(ImageResponse::from)
            .collect();
        Self {
            id: album.id,
            title: album.title,
            slug: album.slug,
            cover_url: album.cover_url,
            is_published: album.is_published,
            images,
        }
    }
}

impl From<Album> for AlbumResponse {
    fn from(album: Album) -> Self {
        Self::with_images(album, &[])
    }
}
