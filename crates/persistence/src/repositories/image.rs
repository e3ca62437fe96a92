//! Image repository for database operations.

use shared::pagination::Page;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ImageEntity;
use crate::metrics::QueryTimer;

const IMAGE_COLUMNS: &str = "id, user_id, album_id, image_url, slug, width, height, created_at";

/// Repository for image-related database operations.
#[derive(Clone)]
pub struct ImageRepository {
    pool: PgPool,
}

impl ImageRepository {
    /// Creates a new ImageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an uploaded image.
    pub async fn create(
        &self,
        user_id: Uuid,
        album_id: Uuid,
        image_url: &str,
        slug: &str,
        width: i32,
        height: i32,
    ) -> Result<ImageEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_image");
        let result = sqlx::query_as::<_, ImageEntity>(&format!(
            r#"
            INSERT INTO images (user_id, album_id, image_url, slug, width, height)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(album_id)
        .bind(image_url)
        .bind(slug)
        .bind(width)
        .bind(height)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an image owned by the given tenant.
    pub async fn find_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ImageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_image_for_user");
        let result = sqlx::query_as::<_, ImageEntity>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an image by slug among the tenant's own images.
    pub async fn find_by_slug_for_user(
        &self,
        user_id: Uuid,
        slug: &str,
    ) -> Result<Option<ImageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_image_by_slug_for_user");
        let result = sqlx::query_as::<_, ImageEntity>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE user_id = $1 AND slug = $2"
        ))
        .bind(user_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List a tenant's images, newest first.
    pub async fn list_for_user(&self, user_id: Uuid, page: Page) -> Result<Vec<ImageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_images_for_user");
        let result = sqlx::query_as::<_, ImageEntity>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS} FROM images
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

    /// All images of the given albums, in upload order.
    pub async fn list_for_albums(&self, album_ids: &[Uuid]) -> Result<Vec<ImageEntity>, sqlx::Error> {
        if album_ids.is_empty() {
            return Ok(Vec::new());
        }
        let timer = QueryTimer::new("list_images_for_albums");
        let result = sqlx::query_as::<_, ImageEntity>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS} FROM images
            WHERE album_id = ANY($1)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(album_ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List a tenant's images that sit in published albums, newest first.
    pub async fn list_published(&self, user_id: Uuid, page: Page) -> Result<Vec<ImageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_published_images");
        let result = sqlx::query_as::<_, ImageEntity>(
            r#"
            SELECT i.id, i.user_id, i.album_id, i.image_url, i.slug, i.width, i.height, i.created_at
            FROM images i
            JOIN albums a ON a.id = i.album_id
            WHERE i.user_id = $1 AND a.is_published
            ORDER BY i.created_at DESC, i.id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an image by slug when its album is published.
    pub async fn find_published_by_slug(
        &self,
        user_id: Uuid,
        slug: &str,
    ) -> Result<Option<ImageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_published_image_by_slug");
        let result = sqlx::query_as::<_, ImageEntity>(
            r#"
            SELECT i.id, i.user_id, i.album_id, i.image_url, i.slug, i.width, i.height, i.created_at
            FROM images i
            JOIN albums a ON a.id = i.album_id
            WHERE i.user_id = $1 AND i.slug = $2 AND a.is_published
            "#,
        )
        .bind(user_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete an image and return it.
    ///
    /// If the image was its album's cover, the cover moves to the oldest
    /// remaining image, or is cleared when the album is now empty.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<Option<ImageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("delete_image");
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, ImageEntity>(&format!(
            "DELETE FROM images WHERE id = $1 AND user_id = $2 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(image) = &deleted {
            let reassigned = sqlx::query(
                r#"
                UPDATE albums
                SET cover_url = (
                    SELECT image_url FROM images
                    WHERE album_id = $1
                    ORDER BY created_at ASC, id ASC
                    LIMIT 1
                )
                WHERE id = $1 AND cover_url = $2
                "#,
            )
            .bind(image.album_id)
            .bind(&image.image_url)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if reassigned > 0 {
                tracing::debug!(album_id = %image.album_id, "Album cover moved after image delete");
            }
        }

        tx.commit().await?;
        timer.record();
        Ok(deleted)
    }

    /// Slugs of the tenant's images equal to `base` or suffixed from it.
    pub async fn slugs_like(&self, user_id: Uuid, base: &str) -> Result<Vec<String>, sqlx::Error> {
        let timer = QueryTimer::new("image_slugs_like");
        let result = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM images WHERE user_id = $1 AND (slug = $2 OR slug LIKE $2 || '-%')",
        )
        .bind(user_id)
        .bind(base)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
