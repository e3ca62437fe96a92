//! Gallery image routes for the signed-in tenant.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::image::ImageResponse;
use domain::models::Image;
use persistence::repositories::ImageRepository;
use shared::pagination::PageParams;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

fn not_found() -> ApiError {
    ApiError::NotFound("Image not found".to_string())
}

/// List the caller's images, newest first.
///
/// GET /api/v1/images
pub async fn list_images(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<ImageResponse>>, ApiError> {
    let images = ImageRepository::new(state.pool.clone())
        .list_for_user(auth.user_id, state.page(&params))
        .await?;

    Ok(Json(
        images
            .into_iter()
            .map(|i| ImageResponse::from(Image::from(i)))
            .collect(),
    ))
}

/// GET /api/v1/images/slug/:slug
pub async fn get_image_by_slug(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(slug): Path<String>,
) -> Result<Json<ImageResponse>, ApiError> {
    let image = ImageRepository::new(state.pool.clone())
        .find_by_slug_for_user(auth.user_id, &slug)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(Image::from(image).into()))
}

/// Delete an image. When it was its album's cover, the cover moves to the
/// oldest remaining image.
///
/// DELETE /api/v1/images/:image_id
pub async fn delete_image(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(image_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let image = ImageRepository::new(state.pool.clone())
        .delete(image_id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    if !state.storage.delete(&image.image_url).await {
        warn!(image_id = %image.id, url = %image.image_url, "Failed to delete image from storage");
    }

    info!(image_id = %image_id, album_id = %image.album_id, "Image deleted");
    Ok(StatusCode::NO_CONTENT)
}
