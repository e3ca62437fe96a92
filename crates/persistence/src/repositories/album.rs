//! Album repository for database operations.

use domain::models::album::UpdateAlbumRequest;
use shared::pagination::Page;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::AlbumEntity;
use crate::metrics::QueryTimer;

const ALBUM_COLUMNS: &str = "id, user_id, title, slug, cover_url, is_published, created_at, updated_at";

/// Repository for album-related database operations.
#[derive(Clone)]
pub struct AlbumRepository {
    pool: PgPool,
}

impl AlbumRepository {
    /// Creates a new AlbumRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an album under an already-resolved slug.
    pub async fn create(
        &self,
        user_id: Uuid,
        title: &str,
        slug: &str,
        is_published: bool,
    ) -> Result<AlbumEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_album");
        let result = sqlx::query_as::<_, AlbumEntity>(&format!(
            r#"
            INSERT INTO albums (user_id, title, slug, is_published)
            VALUES ($1, $2, $3, $4)
            RETURNING {ALBUM_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(title)
        .bind(slug)
        .bind(is_published)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an album owned by the given tenant.
    pub async fn find_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AlbumEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_album_for_user");
        let result = sqlx::query_as::<_, AlbumEntity>(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List a tenant's albums, newest first.
    pub async fn list_for_user(&self, user_id: Uuid, page: Page) -> Result<Vec<AlbumEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_albums_for_user");
        let result = sqlx::query_as::<_, AlbumEntity>(&format!(
            r#"
            SELECT {ALBUM_COLUMNS} FROM albums
            WHERE user_id = $1
            ORDER BY created_at DESC, id ASC
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

    /// List a tenant's published albums, newest first.
    pub async fn list_published(&self, user_id: Uuid, page: Page) -> Result<Vec<AlbumEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_published_albums");
        let result = sqlx::query_as::<_, AlbumEntity>(&format!(
            r#"
            SELECT {ALBUM_COLUMNS} FROM albums
            WHERE user_id = $1 AND is_published
            ORDER BY created_at DESC, id ASC
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

    /// Find a published album by slug.
    pub async fn find_published_by_slug(
        &self,
        user_id: Uuid,
        slug: &str,
    ) -> Result<Option<AlbumEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_published_album_by_slug");
        let result = sqlx::query_as::<_, AlbumEntity>(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums WHERE user_id = $1 AND slug = $2 AND is_published"
        ))
        .bind(user_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Apply a partial update.
    pub async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        request: &UpdateAlbumRequest,
    ) -> Result<Option<AlbumEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_album");
        let result = sqlx::query_as::<_, AlbumEntity>(&format!(
            r#"
            UPDATE albums
            SET title = COALESCE($3, title),
                is_published = COALESCE($4, is_published)
            WHERE id = $1 AND user_id = $2
            RETURNING {ALBUM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(request.title.as_deref())
        .bind(request.is_published)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Set the cover URL unless the album already has one.
    pub async fn set_cover_if_missing(
        &self,
        id: Uuid,
        user_id: Uuid,
        cover_url: &str,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("set_album_cover_if_missing");
        let result = sqlx::query(
            "UPDATE albums SET cover_url = $3 WHERE id = $1 AND user_id = $2 AND cover_url IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .bind(cover_url)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Delete an album. Its images go with it.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_album");
        let result = sqlx::query("DELETE FROM albums WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Slugs of the tenant's albums equal to `base` or suffixed from it.
    pub async fn slugs_like(&self, user_id: Uuid, base: &str) -> Result<Vec<String>, sqlx::Error> {
        let timer = QueryTimer::new("album_slugs_like");
        let result = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM albums WHERE user_id = $1 AND (slug = $2 OR slug LIKE $2 || '-%')",
        )
        .bind(user_id)
        .bind(base)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
