//! Event repository for database operations.

use domain::models::event::{CreateEventRequest, UpdateEventRequest};
use shared::pagination::Page;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::EventEntity;
use crate::metrics::QueryTimer;

const EVENT_COLUMNS: &str = "id, user_id, title, slug, summary, content, cover_image, start_at, \
                             end_at, location, location_url, is_published, created_at, updated_at";

/// Repository for event-related database operations.
#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    /// Creates a new EventRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an event for a tenant under an already-resolved slug.
    pub async fn create(
        &self,
        user_id: Uuid,
        slug: &str,
        request: &CreateEventRequest,
    ) -> Result<EventEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_event");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            INSERT INTO events (user_id, title, slug, summary, content, start_at, end_at,
                                location, location_url, is_published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&request.title)
        .bind(slug)
        .bind(&request.summary)
        .bind(&request.content)
        .bind(request.start_at)
        .bind(request.end_at)
        .bind(&request.location)
        .bind(request.location_url.as_deref())
        .bind(request.is_published)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an event owned by the given tenant.
    pub async fn find_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_for_user");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List a tenant's events, soonest first.
    pub async fn list_for_user(&self, user_id: Uuid, page: Page) -> Result<Vec<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_events_for_user");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events
            WHERE user_id = $1
            ORDER BY start_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List a tenant's published events, soonest first.
    pub async fn list_published(&self, user_id: Uuid, page: Page) -> Result<Vec<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_published_events");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events
            WHERE user_id = $1 AND is_published
            ORDER BY start_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a published event by slug.
    pub async fn find_published_by_slug(
        &self,
        user_id: Uuid,
        slug: &str,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_published_event_by_slug");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE user_id = $1 AND slug = $2 AND is_published"
        ))
        .bind(user_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Apply a partial update. Returns `None` when the event does not belong
    /// to the tenant.
    pub async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        request: &UpdateEventRequest,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_event");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            UPDATE events
            SET title = COALESCE($3, title),
                summary = COALESCE($4, summary),
                content = COALESCE($5, content),
                start_at = COALESCE($6, start_at),
                end_at = COALESCE($7, end_at),
                location = COALESCE($8, location),
                location_url = COALESCE($9, location_url),
                is_published = COALESCE($10, is_published)
            WHERE id = $1 AND user_id = $2
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(request.title.as_deref())
        .bind(request.summary.as_deref())
        .bind(request.content.as_deref())
        .bind(request.start_at)
        .bind(request.end_at)
        .bind(request.location.as_deref())
        .bind(request.location_url.as_deref())
        .bind(request.is_published)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Replace the cover image URL.
    pub async fn set_cover_image(
        &self,
        id: Uuid,
        user_id: Uuid,
        cover_image: &str,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_event_cover_image");
        let result = sqlx::query_as::<_, EventEntity>(&format!(
            r#"
            UPDATE events SET cover_image = $3
            WHERE id = $1 AND user_id = $2
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(cover_image)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete an event. Returns whether a row was removed.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_event");
        let result = sqlx::query("DELETE FROM events WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Slugs of the tenant's events equal to `base` or suffixed from it.
    pub async fn slugs_like(&self, user_id: Uuid, base: &str) -> Result<Vec<String>, sqlx::Error> {
        let timer = QueryTimer::new("event_slugs_like");
        let result = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM events WHERE user_id = $1 AND (slug = $2 OR slug LIKE $2 || '-%')",
        )
        .bind(user_id)
        .bind(base)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
