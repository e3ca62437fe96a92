//! Event management routes for the signed-in tenant.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::event::{
    CreateEventRequest, EventResponse, UpdateEventRequest, EVENT_SLUG_FALLBACK,
};
use domain::models::image::extension_for;
use domain::models::Event;
use domain::services::storage::EVENTS_FOLDER;
use persistence::repositories::EventRepository;
use shared::pagination::PageParams;
use shared::slug::{next_available_slug, slugify_or};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::{ApiError, ValidationDetail};
use crate::extractors::UserAuth;
use crate::routes::uploads::read_images;

/// Multipart part carrying an event cover.
pub const COVER_FIELD: &str = "file";

fn not_found() -> ApiError {
    ApiError::NotFound("Event not found".to_string())
}

async fn find_event(repo: &EventRepository, id: Uuid, user_id: Uuid) -> Result<Event, ApiError> {
    repo.find_by_id_for_user(id, user_id)
        .await?
        .map(Event::from)
        .ok_or_else(not_found)
}

/// List the caller's events, soonest first.
///
/// GET /api/v1/events
pub async fn list_events(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let repo = EventRepository::new(state.pool.clone());
    let events = repo.list_for_user(auth.user_id, state.page(&params)).await?;

    Ok(Json(
        events
            .into_iter()
            .map(|e| EventResponse::from(Event::from(e)))
            .collect(),
    ))
}

/// Create an event.
///
/// POST /api/v1/events
pub async fn create_event(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), ApiError> {
    let request = request.normalized();
    request.validate()?;

    let repo = EventRepository::new(state.pool.clone());
    let base = slugify_or(&request.title, EVENT_SLUG_FALLBACK);
    let taken = repo.slugs_like(auth.user_id, &base).await?;
    let slug = next_available_slug(&base, &taken);

    let event: Event = repo.create(auth.user_id, &slug, &request).await?.into();
    info!(event_id = %event.id, user_id = %auth.user_id, slug = %event.slug, "Event created");

    Ok((StatusCode::CREATED, Json(event.into())))
}

/// Get one of the caller's events.
///
/// GET /api/v1/events/:event_id
pub async fn get_event(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventResponse>, ApiError> {
    let repo = EventRepository::new(state.pool.clone());
    let event = find_event(&repo, event_id, auth.user_id).await?;
    Ok(Json(event.into()))
}

/// Partially update an event. The slug is kept when the title changes.
///
/// PATCH /api/v1/events/:event_id
pub async fn update_event(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(event_id): Path<Uuid>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    let request = request.normalized();
    request.validate()?;

    let repo = EventRepository::new(state.pool.clone());
    let current = find_event(&repo, event_id, auth.user_id).await?;
    if request.is_empty() {
        return Ok(Json(current.into()));
    }

    if let Err(e) = request.check_against(&current) {
        let message = e
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| e.code.to_string());
        return Err(ApiError::Validation {
            message: message.clone(),
            details: vec![ValidationDetail {
                field: "end_at".to_string(),
                message,
            }],
        });
    }

    let event: Event = repo
        .update(event_id, auth.user_id, &request)
        .await?
        .ok_or_else(not_found)?
        .into();

    info!(event_id = %event.id, "Event updated");
    Ok(Json(event.into()))
}

/// Delete an event and, best-effort, its cover object.
///
/// DELETE /api/v1/events/:event_id
pub async fn delete_event(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = EventRepository::new(state.pool.clone());
    let event = find_event(&repo, event_id, auth.user_id).await?;

    if let Some(cover) = event.cover_image.as_deref() {
        if !state.storage.delete(cover).await {
            warn!(event_id = %event.id, url = %cover, "Failed to delete event cover from storage");
        }
    }

    if !repo.delete(event_id, auth.user_id).await? {
        return Err(not_found());
    }

    info!(event_id = %event_id, user_id = %auth.user_id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Upload or replace an event's cover image.
///
/// PUT /api/v1/events/:event_id/cover
pub async fn upload_cover(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(event_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<EventResponse>, ApiError> {
    let repo = EventRepository::new(state.pool.clone());
    let event = find_event(&repo, event_id, auth.user_id).await?;

    let mut policy = state.upload_policy();
    policy.max_files = 1;
    let mut files = read_images(&mut multipart, COVER_FIELD, &policy).await?;
    let file = files.remove(0);

    let file_name = format!("{}.{}", event.slug, extension_for(&file.content_type));
    let target_suffix = format!("/{}/{}/{}", auth.user_id, EVENTS_FOLDER, file_name);

    // An object already stored under the same name has to go first.
    let previous = event.cover_image.clone();
    let same_object = previous
        .as_deref()
        .is_some_and(|url| url.ends_with(&target_suffix));
    if let Some(url) = previous.as_deref().filter(|_| same_object) {
        if !state.storage.delete(url).await {
            warn!(
                event_id = %event_id,
                url = %url,
                "Failed to delete event cover before replacement"
            );
        }
    }

    let stored = state
        .storage
        .upload(
            auth.user_id,
            EVENTS_FOLDER,
            Some(&file_name),
            file.data,
            &file.content_type,
        )
        .await?;

    let updated: Event = repo
        .set_cover_image(event_id, auth.user_id, &stored.public_url)
        .await?
        .ok_or_else(not_found)?
        .into();

    if let Some(old) = previous.filter(|_| !same_object) {
        if !state.storage.delete(&old).await {
            warn!(event_id = %event_id, url = %old, "Failed to delete previous event cover");
        }
    }

    info!(event_id = %event_id, path = %stored.path, "Event cover uploaded");
    Ok(Json(updated.into()))
}
