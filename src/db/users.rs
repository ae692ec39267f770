//! PostgreSQL-backed user store. Schema: `migrations/0001_create_users.sql`.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{normalize_identifier, DbPool, UserStore, DUPLICATE_USER};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User, UserPatch, WriteMode};

const USER_COLUMNS: &str = "id, username, email, fullname, avatar, cover_image, password_hash, refresh_token, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email_or_username(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> AppResult<Option<User>> {
        let email = normalize_identifier(email);
        let username = normalize_identifier(username);
        if email.is_none() && username.is_none() {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $2 LIMIT 1"
        ))
        .bind(email)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let user = new_user.into_user()?;
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, fullname, avatar, cover_image, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.fullname)
        .bind(&user.avatar)
        .bind(&user.cover_image)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_write(e, DUPLICATE_USER))?;
        Ok(row)
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        patch: UserPatch,
        mode: WriteMode,
    ) -> AppResult<Option<User>> {
        if mode == WriteMode::Validated {
            let Some(mut user) = self.find_by_id(id).await? else {
                return Ok(None);
            };
            patch.clone().apply(&mut user);
            user.validate_profile()?;
        }

        // Untouched columns keep their current value so concurrent writers do not
        // overwrite each other with stale snapshots.
        let (set_refresh_token, refresh_token) = match patch.refresh_token {
            Some(token) => (true, token),
            None => (false, None),
        };
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET fullname = COALESCE($2, fullname),
                avatar = COALESCE($3, avatar),
                cover_image = COALESCE($4, cover_image),
                refresh_token = CASE WHEN $5 THEN $6 ELSE refresh_token END,
                updated_at = $7
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.fullname)
        .bind(patch.avatar)
        .bind(patch.cover_image)
        .bind(set_refresh_token)
        .bind(refresh_token)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
