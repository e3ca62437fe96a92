//! Event domain model and request/response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::validation::{validate_http_url, validate_not_blank, validate_not_in_past};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Slug used when an event title has no URL-safe characters.
pub const EVENT_SLUG_FALLBACK: &str = "event";

/// A scheduled event owned by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Event {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: String,
    pub location_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for creating an event.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_create_schedule"))]
pub struct CreateEventRequest {
    #[validate(length(min = 3, max = 150, message = "Title must be between 3 and 150 characters"))]
    pub title: String,

    #[validate(length(min = 3, max = 255, message = "Summary must be between 3 and 255 characters"))]
    pub summary: String,

    #[validate(length(min = 3, message = "Content must be at least 3 characters"))]
    pub content: String,

    pub start_at: DateTime<Utc>,

    pub end_at: DateTime<Utc>,

    #[validate(
        length(max = 255, message = "Location must be at most 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub location: String,

    #[validate(
        length(max = 500, message = "Location URL must be at most 500 characters"),
        custom(function = "validate_http_url")
    )]
    pub location_url: Option<String>,

    #[serde(default)]
    pub is_published: bool,
}

/// Request payload for updating an event. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_update_schedule"))]
pub struct UpdateEventRequest {
    #[validate(length(min = 3, max = 150, message = "Title must be between 3 and 150 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 3, max = 255, message = "Summary must be between 3 and 255 characters"))]
    pub summary: Option<String>,

    #[validate(length(min = 3, message = "Content must be at least 3 characters"))]
    pub content: Option<String>,

    pub start_at: Option<DateTime<Utc>>,

    pub end_at: Option<DateTime<Utc>>,

    #[validate(
        length(max = 255, message = "Location must be at most 255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub location: Option<String>,

    #[validate(
        length(max = 500, message = "Location URL must be at most 500 characters"),
        custom(function = "validate_http_url")
    )]
    pub location_url: Option<String>,

    pub is_published: Option<bool>,
}

fn trimmed(value: String) -> String {
    value.trim().to_string()
}

impl CreateEventRequest {
    /// Trims text fields before validation.
    pub fn normalized(mut self) -> Self {
        self.title = trimmed(self.title);
        self.summary = trimmed(self.summary);
        self.content = trimmed(self.content);
        self.location = trimmed(self.location);
        self.location_url = self.location_url.map(trimmed);
        self
    }
}

impl UpdateEventRequest {
    /// Trims text fields before validation.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.map(trimmed);
        self.summary = self.summary.map(trimmed);
        self.content = self.content.map(trimmed);
        self.location = self.location.map(trimmed);
        self.location_url = self.location_url.map(trimmed);
        self
    }

    /// Whether the request changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.summary.is_none()
            && self.content.is_none()
            && self.start_at.is_none()
            && self.end_at.is_none()
            && self.location.is_none()
            && self.location_url.is_none()
            && self.is_published.is_none()
    }

    /// Checks that the schedule after applying this update to `current` is
    /// still ordered.
    pub fn check_against(&self, current: &Event) -> Result<(), ValidationError> {
        let start = self.start_at.unwrap_or(current.start_at);
        let end = self.end_at.unwrap_or(current.end_at);
        check_order(&start, &end)
    }
}

fn check_order(start: &DateTime<Utc>, end: &DateTime<Utc>) -> Result<(), ValidationError> {
    if end < start {
        let mut err = ValidationError::new("schedule_order");
        err.message = Some("End date & time cannot be before the start".into());
        return Err(err);
    }
    Ok(())
}

fn validate_create_schedule(req: &CreateEventRequest) -> Result<(), ValidationError> {
    validate_not_in_past(&req.start_at)?;
    validate_not_in_past(&req.end_at)?;
    check_order(&req.start_at, &req.end_at)
}

fn validate_update_schedule(req: &UpdateEventRequest) -> Result<(), ValidationError> {
    if let Some(start) = &req.start_at {
        validate_not_in_past(start)?;
    }
    if let Some(end) = &req.end_at {
        validate_not_in_past(end)?;
    }
    if let (Some(start), Some(end)) = (&req.start_at, &req.end_at) {
        check_order(start, end)?;
    }
    Ok(())
}

/// Event as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EventResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: String,
    pub location_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            title: event.title,
            slug: event.slug,
            summary: event.summary,
            content: event.content,
            cover_image: event.cover_image,
            start_at: event.start_at,
            end_at: event.end_at,
            location: event.location,
            location_url: event.location_url,
            is_published: event.is_published,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}
