//! In-process user store for tests and local runs without PostgreSQL.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{normalize_identifier, UserStore, DUPLICATE_USER};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User, UserPatch, WriteMode};

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email_or_username(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> AppResult<Option<User>> {
        let email = normalize_identifier(email);
        let username = normalize_identifier(username);
        let users = self.users.read().await;
        let found = users.values().find(|u| {
            email.as_deref() == Some(u.email.as_str())
                || username.as_deref() == Some(u.username.as_str())
        });
        Ok(found.cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let user = new_user.into_user()?;
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(AppError::Conflict(DUPLICATE_USER.to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        patch: UserPatch,
        mode: WriteMode,
    ) -> AppResult<Option<User>> {
        let mut users = self.users.write().await;
        let Some(stored) = users.get_mut(&id) else {
            return Ok(None);
        };
        let mut updated = stored.clone();
        patch.apply(&mut updated);
        if mode == WriteMode::Validated {
            updated.validate_profile()?;
        }
        *stored = updated.clone();
        Ok(Some(updated))
    }
}
