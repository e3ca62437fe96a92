//! Gallery album routes, including image upload.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::album::{
    AlbumResponse, CreateAlbumRequest, UpdateAlbumRequest, ALBUM_SLUG_FALLBACK,
};
use domain::models::image::{extension_for, ImageResponse, IMAGE_SLUG_FALLBACK};
use domain::models::{Album, Image};
use domain::services::storage::GALLERY_FOLDER;
use persistence::entities::AlbumEntity;
use persistence::repositories::{AlbumRepository, ImageRepository};
use shared::pagination::PageParams;
use shared::slug::{next_available_slug, slugify_or};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::middleware::metrics::record_images_uploaded;
use crate::routes::uploads::read_images;

/// Multipart part carrying gallery images. May repeat.
pub const FILES_FIELD: &str = "files";

fn not_found() -> ApiError {
    ApiError::NotFound("Album not found".to_string())
}

/// Attaches images to albums with one query for the whole page.
pub(crate) async fn with_images(
    images: &ImageRepository,
    albums: Vec<AlbumEntity>,
) -> Result<Vec<AlbumResponse>, ApiError> {
    let ids: Vec<Uuid> = albums.iter().map(|a| a.id).collect();
    let all: Vec<Image> = images
        .list_for_albums(&ids)
        .await?
        .into_iter()
        .map(Image::from)
        .collect();

    Ok(albums
        .into_iter()
        .map(|a| AlbumResponse::with_images(Album::from(a), &all))
        .collect())
}

async fn find_album(repo: &AlbumRepository, id: Uuid, user_id: Uuid) -> Result<Album, ApiError> {
    repo.find_by_id_for_user(id, user_id)
        .await?
        .map(Album::from)
        .ok_or_else(not_found)
}

/// Create an empty album.
///
/// POST /api/v1/albums
pub async fn create_album(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateAlbumRequest>,
) -> Result<(StatusCode, Json<AlbumResponse>), ApiError> {
    let request = request.normalized();
    request.validate()?;

    let repo = AlbumRepository::new(state.pool.clone());
    let title = request.title.as_str();
    let base = slugify_or(title, ALBUM_SLUG_FALLBACK);
    let taken = repo.slugs_like(auth.user_id, &base).await?;
    let slug = next_available_slug(&base, &taken);

    let album: Album = repo
        .create(auth.user_id, title, &slug, request.is_published)
        .await?
        .into();
    info!(album_id = %album.id, user_id = %auth.user_id, slug = %album.slug, "Album created");

    Ok((StatusCode::CREATED, Json(album.into())))
}

/// List the caller's albums with their images, newest first.
///
/// GET /api/v1/albums
pub async fn list_albums(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<AlbumResponse>>, ApiError> {
    let albums = AlbumRepository::new(state.pool.clone())
        .list_for_user(auth.user_id, state.page(&params))
        .await?;
    let images = ImageRepository::new(state.pool.clone());
    Ok(Json(with_images(&images, albums).await?))
}

/// Get one of the caller's albums.
///
/// GET /api/v1/albums/:album_id
pub async fn get_album(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(album_id): Path<Uuid>,
) -> Result<Json<AlbumResponse>, ApiError> {
    let album = AlbumRepository::new(state.pool.clone())
        .find_by_id_for_user(album_id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;
    let images = ImageRepository::new(state.pool.clone());
    let mut albums = with_images(&images, vec![album]).await?;
    albums.pop().map(Json).ok_or_else(not_found)
}

/// Rename or (un)publish an album.
///
/// PATCH /api/v1/albums/:album_id
pub async fn update_album(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(album_id): Path<Uuid>,
    Json(request): Json<UpdateAlbumRequest>,
) -> Result<Json<AlbumResponse>, ApiError> {
    let request = request.normalized();
    request.validate()?;

    let album = AlbumRepository::new(state.pool.clone())
        .update(album_id, auth.user_id, &request)
        .await?
        .ok_or_else(not_found)?;
    info!(album_id = %album_id, "Album updated");

    let images = ImageRepository::new(state.pool.clone());
    let mut albums = with_images(&images, vec![album]).await?;
    albums.pop().map(Json).ok_or_else(not_found)
}

/// Delete an album with its images. Stored objects are removed best-effort.
///
/// DELETE /api/v1/albums/:album_id
pub async fn delete_album(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(album_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = AlbumRepository::new(state.pool.clone());
    let album = find_album(&repo, album_id, auth.user_id).await?;
    let images = ImageRepository::new(state.pool.clone())
        .list_for_albums(&[album.id])
        .await?;

    if !repo.delete(album_id, auth.user_id).await? {
        return Err(not_found());
    }

    for image in &images {
        if !state.storage.delete(&image.image_url).await {
            warn!(image_id = %image.id, url = %image.image_url, "Failed to delete image from storage");
        }
    }

    info!(
        album_id = %album_id,
        user_id = %auth.user_id,
        images = images.len(),
        "Album deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Upload one or more images into an album.
///
/// Every file is checked before anything is stored. Slugs derive from the
/// album title. The first uploaded image becomes the cover of an album that
/// has none.
///
/// POST /api/v1/albums/:album_id/images
pub async fn upload_images(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(album_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<ImageResponse>>), ApiError> {
    let albums = AlbumRepository::new(state.pool.clone());
    let album = find_album(&albums, album_id, auth.user_id).await?;

    let files = read_images(&mut multipart, FILES_FIELD, &state.upload_policy()).await?;

    let images = ImageRepository::new(state.pool.clone());
    let base = slugify_or(&album.title, IMAGE_SLUG_FALLBACK);
    let mut taken = images.slugs_like(auth.user_id, &base).await?;

    let mut uploaded = Vec::with_capacity(files.len());
    for file in files {
        let slug = next_available_slug(&base, &taken);
        let file_name = format!("{}.{}", slug, extension_for(&file.content_type));

        let stored = state
            .storage
            .upload(
                auth.user_id,
                GALLERY_FOLDER,
                Some(&file_name),
                file.data,
                &file.content_type,
            )
            .await?;

        let image: Image = images
            .create(
                auth.user_id,
                album.id,
                &stored.public_url,
                &slug,
                file.width,
                file.height,
            )
            .await?
            .into();

        taken.push(slug);
        uploaded.push(image);
    }

    if let Some(first) = uploaded.first() {
        albums
            .set_cover_if_missing(album.id, auth.user_id, &first.image_url)
            .await?;
    }

    record_images_uploaded(uploaded.len());
    info!(
        album_id = %album.id,
        user_id = %auth.user_id,
        count = uploaded.len(),
        "Images uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(uploaded.into_iter().map(ImageResponse::from).collect()),
    ))
}
