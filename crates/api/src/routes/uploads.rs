//! Multipart image intake shared by the upload routes.

use axum::extract::Multipart;
use bytes::Bytes;
use domain::models::image::{ImageUploadPolicy, UploadRejection};

use crate::error::ApiError;
use crate::services::images::probe_dimensions;

/// An uploaded file that passed the upload policy.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
    pub width: i32,
    pub height: i32,
}

/// Reads every part named `field_name`, checking content type, size and
/// decodability. Other parts are skipped.
pub async fn read_images(
    multipart: &mut Multipart,
    field_name: &str,
    policy: &ImageUploadPolicy,
) -> Result<Vec<UploadedImage>, ApiError> {
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }

        if images.len() >= policy.max_files {
            return Err(UploadRejection::TooManyFiles(policy.max_files).into());
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        policy.check_content_type(content_type.as_deref())?;

        let data = field.bytes().await?;
        policy.check_size(&file_name, data.len())?;
        let (width, height) = probe_dimensions(&data)?;

        images.push(UploadedImage {
            file_name,
            content_type: content_type.unwrap_or_default(),
            data,
            width,
            height,
        });
    }

    policy.check_count(images.len())?;
    Ok(images)
}
