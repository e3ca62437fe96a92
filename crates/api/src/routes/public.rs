//! Unauthenticated read endpoints for tenant websites.
//!
//! The tenant is named by the `user_id` query parameter. Only published
//! events, published albums and images inside published albums are visible.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::album::AlbumResponse;
use domain::models::event::EventResponse;
use domain::models::image::ImageResponse;
use domain::models::{Event, Image};
use persistence::repositories::{AlbumRepository, EventRepository, ImageRepository};
use shared::pagination::PageParams;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TenantQuery;
use crate::routes::albums::with_images;

/// GET /api/v1/public/events
pub async fn list_events(
    State(state): State<AppState>,
    TenantQuery(user_id): TenantQuery,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let events = EventRepository::new(state.pool.clone())
        .list_published(user_id, state.page(&params))
        .await?;

    Ok(Json(
        events
            .into_iter()
            .map(|e| EventResponse::from(Event::from(e)))
            .collect(),
    ))
}

/// GET /api/v1/public/events/:slug
pub async fn get_event(
    State(state): State<AppState>,
    TenantQuery(user_id): TenantQuery,
    Path(slug): Path<String>,
) -> Result<Json<EventResponse>, ApiError> {
    let event = EventRepository::new(state.pool.clone())
        .find_published_by_slug(user_id, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    Ok(Json(Event::from(event).into()))
}

/// GET /api/v1/public/albums
pub async fn list_albums(
    State(state): State<AppState>,
    TenantQuery(user_id): TenantQuery,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<AlbumResponse>>, ApiError> {
    let albums = AlbumRepository::new(state.pool.clone())
        .list_published(user_id, state.page(&params))
        .await?;
    let images = ImageRepository::new(state.pool.clone());
    Ok(Json(with_images(&images, albums).await?))
}

/// GET /api/v1/public/albums/:slug
pub async fn get_album(
    State(state): State<AppState>,
    TenantQuery(user_id): TenantQuery,
    Path(slug): Path<String>,
) -> Result<Json<AlbumResponse>, ApiError> {
    let not_found = || ApiError::NotFound("Album not found".to_string());
    let album = AlbumRepository::new(state.pool.clone())
        .find_published_by_slug(user_id, &slug)
        .await?
        .ok_or_else(not_found)?;

    let images = ImageRepository::new(state.pool.clone());
    let mut albums = with_images(&images, vec![album]).await?;
    albums.pop().map(Json).ok_or_else(not_found)
}

/// GET /api/v1/public/images
pub async fn list_images(
    State(state): State<AppState>,
    TenantQuery(user_id): TenantQuery,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<ImageResponse>>, ApiError> {
    let images = ImageRepository::new(state.pool.clone())
        .list_published(user_id, state.page(&params))
        .await?;

    Ok(Json(
        images
            .into_iter()
            .map(|i| ImageResponse::from(Image::from(i)))
            .collect(),
    ))
}

/// GET /api/v1/public/images/:slug
pub async fn get_image(
    State(state): State<AppState>,
    TenantQuery(user_id): TenantQuery,
    Path(slug): Path<String>,
) -> Result<Json<ImageResponse>, ApiError> {
    let image = ImageRepository::new(state.pool.clone())
        .find_published_by_slug(user_id, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))?;

    Ok(Json(Image::from(image).into()))
}
