//! User record, its sanitized view, and the create/patch inputs of the credential store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

use crate::auth::{hash_password, verify_password};
use crate::error::{AppError, AppResult};

/// Persisted user. Holds the credential secret and the live refresh token, so it
/// is never serialized directly; see [`UserView`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_password_correct(&self, password: &str) -> AppResult<bool> {
        verify_password(password, &self.password_hash)
    }

    pub fn view(&self) -> UserView {
        UserView::from(self)
    }

    /// Profile checks run by validated writes.
    pub fn validate_profile(&self) -> AppResult<()> {
        for (name, value) in [
            ("username", &self.username),
            ("email", &self.email),
            ("fullname", &self.fullname),
            ("avatar", &self.avatar),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} is required", name)));
            }
        }
        if !self.email.validate_email() {
            return Err(AppError::Validation("Invalid email".to_string()));
        }
        Ok(())
    }
}

/// Sanitized user: everything except the password hash and refresh token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            fullname: user.fullname.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Input of `UserStore::create`. The password is plaintext until [`NewUser::into_user`].
#[derive(Debug, Clone, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub fullname: String,
    #[validate(length(min = 1))]
    pub avatar: String,
    pub cover_image: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

impl NewUser {
    /// The store's write path: normalize identity fields, validate, hash the password.
    pub fn into_user(self) -> AppResult<User> {
        let new_user = NewUser {
            username: self.username.trim().to_lowercase(),
            email: self.email.trim().to_lowercase(),
            fullname: self.fullname.trim().to_string(),
            ..self
        };
        new_user
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let now = Utc::now();
        Ok(User {
            id: Uuid::new_v4(),
            password_hash: hash_password(&new_user.password)?,
            username: new_user.username,
            email: new_user.email,
            fullname: new_user.fullname,
            avatar: new_user.avatar,
            cover_image: new_user.cover_image,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update. `None` leaves a field untouched; `refresh_token: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub fullname: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub refresh_token: Option<Option<String>>,
}

impl UserPatch {
    pub fn set_refresh_token(token: impl Into<String>) -> Self {
        Self {
            refresh_token: Some(Some(token.into())),
            ..Self::default()
        }
    }

    pub fn clear_refresh_token() -> Self {
        Self {
            refresh_token: Some(None),
            ..Self::default()
        }
    }

    pub fn apply(self, user: &mut User) {
        if let Some(fullname) = self.fullname {
            user.fullname = fullname;
        }
        if let Some(avatar) = self.avatar {
            user.avatar = avatar;
        }
        if let Some(cover_image) = self.cover_image {
            user.cover_image = cover_image;
        }
        if let Some(refresh_token) = self.refresh_token {
            user.refresh_token = refresh_token;
        }
        user.updated_at = Utc::now();
    }
}

/// Whether `update_by_id` re-validates the full record before writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Validated,
    /// Write the patch even if unrelated profile fields would fail validation.
    SkipValidation,
}
