//! User repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

const USER_COLUMNS: &str = "id, provider_user_id, email, username, is_active, is_email_verified, \
                            avatar_url, user_metadata, created_at, updated_at";

/// Case-insensitive unique index on `users.username`.
const USERNAME_INDEX: &str = "idx_users_username_lower";

/// Whether an insert failed because another account holds the username.
pub fn is_username_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(USERNAME_INDEX)
        }
        _ => false,
    }
}

/// Repository for user-related database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by local ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a user by the identity provider's user ID.
    pub async fn find_by_provider_id(
        &self,
        provider_user_id: Uuid,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_provider_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE provider_user_id = $1"
        ))
        .bind(provider_user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a user by username, case-insensitively.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_username");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Insert the mirror of a provider account, or refresh it if it exists.
    ///
    /// On conflict the email is updated and, when `is_email_verified` is
    /// given, the verification flag too. The stored username never changes.
    pub async fn upsert_from_provider(
        &self,
        provider_user_id: Uuid,
        email: &str,
        username: &str,
        is_email_verified: Option<bool>,
    ) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_user_from_provider");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            INSERT INTO users (provider_user_id, email, username, is_email_verified)
            VALUES ($1, $2, $3, COALESCE($4, FALSE))
            ON CONFLICT (provider_user_id) DO UPDATE
            SET email = EXCLUDED.email,
                is_email_verified = COALESCE($4, users.is_email_verified)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(provider_user_id)
        .bind(email)
        .bind(username)
        .bind(is_email_verified)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
