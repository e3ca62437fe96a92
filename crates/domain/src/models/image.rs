//! Gallery image model, DTOs and upload rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Slug used when an album title has no URL-safe characters.
pub const IMAGE_SLUG_FALLBACK: &str = "image";

/// Content types accepted for uploads.
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Default maximum size of one uploaded file (5 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Default maximum number of files in one upload request.
pub const DEFAULT_MAX_FILES_PER_UPLOAD: usize = 20;

/// An uploaded image belonging to an album.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Image {
    pub id: Uuid,
    pub user_id: Uuid,
    pub album_id: Uuid,
    pub image_url: String,
    pub slug: String,
    pub width: i32,
    pub height: i32,
    pub created_at: DateTime<Utc>,
}

/// Image as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub slug: String,
    pub width: i32,
    pub height: i32,
    pub image_url: String,
}

impl From<Image> for ImageResponse {
    fn from(image: Image) -> Self {
        Self {
            id: image.id,
            slug: image.slug,
            width: image.width,
            height: image.height,
            image_url: image.image_url,
        }
    }
}

/// Reasons an uploaded file is rejected before it reaches storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("File '{name}' exceeds maximum size of {limit_mb}MB")]
    TooLarge { name: String, limit_mb: usize },

    #[error("No files provided")]
    NoFiles,

    #[error("Too many files: at most {0} files per upload")]
    TooManyFiles(usize),

    #[error("Could not process image. File may be corrupted.")]
    Unreadable,
}

/// Limits applied to image uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageUploadPolicy {
    pub max_bytes: usize,
    pub max_files: usize,
}

impl Default for ImageUploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_files: DEFAULT_MAX_FILES_PER_UPLOAD,
        }
    }
}

impl ImageUploadPolicy {
    pub fn new(max_bytes: usize, max_files: usize) -> Self {
        Self {
            max_bytes,
            max_files,
        }
    }

    /// Accepts only JPEG, PNG and WebP content types.
    pub fn check_content_type(&self, content_type: Option<&str>) -> Result<(), UploadRejection> {
        let content_type = content_type.unwrap_or_default();
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if ALLOWED_IMAGE_TYPES.contains(&essence.as_str()) {
            Ok(())
        } else {
            Err(UploadRejection::InvalidContentType(content_type.to_string()))
        }
    }

    pub fn check_size(&self, file_name: &str, len: usize) -> Result<(), UploadRejection> {
        if len > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                name: file_name.to_string(),
                limit_mb: self.max_bytes / (1024 * 1024),
            });
        }
        Ok(())
    }

    pub fn check_count(&self, count: usize) -> Result<(), UploadRejection> {
        if count == 0 {
            return Err(UploadRejection::NoFiles);
        }
        if count > self.max_files {
            return Err(UploadRejection::TooManyFiles(self.max_files));
        }
        Ok(())
    }

    /// Upper bound for a whole multipart request body, with headroom for
    /// multipart framing.
    pub fn max_request_bytes(&self) -> usize {
        self.max_bytes
            .saturating_mul(self.max_files)
            .saturating_add(64 * 1024)
    }
}

/// File extension for an accepted content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}
