//! Credential store: the `UserStore` seam, its PostgreSQL and in-memory implementations.

mod memory;
mod pool;
mod users;

pub use memory::MemoryUserStore;
pub use pool::{create_pool, run_migrations, DbPool};
pub use users::PgUserStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{NewUser, User, UserPatch, WriteMode};

pub(crate) const DUPLICATE_USER: &str = "User with this email or username already exists";

/// Persistence for user records, including the live refresh token.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Match on whichever identifiers are present. With neither present, matches nothing.
    async fn find_by_email_or_username(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> AppResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Validate, hash the password, and insert. Duplicate email or username is `Conflict`.
    async fn create(&self, new_user: NewUser) -> AppResult<User>;

    /// Apply `patch` to the user with `id`. Returns `None` if no such user exists.
    async fn update_by_id(
        &self,
        id: Uuid,
        patch: UserPatch,
        mode: WriteMode,
    ) -> AppResult<Option<User>>;
}

/// Lowercased, trimmed lookup key; blank identifiers count as absent.
pub(crate) fn normalize_identifier(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}
