//! Token service: mints token pairs, persists the refresh token, and rotates it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use super::jwt::{
    describe_token_error, sign_access_token, sign_refresh_token, verify_access_token,
    verify_refresh_token, AccessClaims, TokenConfig,
};
use crate::db::UserStore;
use crate::error::{AppError, AppResult};
use crate::models::{UserPatch, WriteMode};

const TOKEN_FAILURE: &str = "Something went wrong while generating refresh and access token";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn UserStore>,
    config: TokenConfig,
}

impl TokenService {
    pub fn new(store: Arc<dyn UserStore>, config: TokenConfig) -> Self {
        Self { store, config }
    }

    /// Mint a fresh pair for `user_id` and store the refresh token on the user,
    /// bypassing profile validation.
    ///
    /// `NotFound` if the user does not exist; `Internal` if signing or the write fails.
    pub async fn generate_token_pair(&self, user_id: Uuid) -> AppResult<TokenPair> {
        let user = self
            .store
            .find_by_id(user_id)
            .await
            .map_err(|e| token_failure(user_id, e))?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let access_token =
            sign_access_token(&user, &self.config.access_secret, self.config.access_ttl)
                .map_err(|e| token_failure(user_id, e))?;
        let refresh_token =
            sign_refresh_token(user.id, &self.config.refresh_secret, self.config.refresh_ttl)
                .map_err(|e| token_failure(user_id, e))?;

        self.store
            .update_by_id(
                user.id,
                UserPatch::set_refresh_token(refresh_token.clone()),
                WriteMode::SkipValidation,
            )
            .await
            .map_err(|e| token_failure(user_id, e))?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a presented refresh token for a new pair.
    ///
    /// The token must verify, name an existing user, and equal that user's stored
    /// refresh token exactly. Once rotated away, a token never matches again.
    /// Every failure is surfaced as `Unauthorized`.
    pub async fn rotate(&self, presented: Option<&str>) -> AppResult<TokenPair> {
        let Some(presented) = presented.filter(|t| !t.is_empty()) else {
            debug!(stage = "presented", "refresh rejected: no token");
            return Err(AppError::Unauthorized("Unauthorized request".to_string()));
        };
        self.rotate_presented(presented)
            .await
            .map_err(AppError::into_unauthorized)
    }

    async fn rotate_presented(&self, presented: &str) -> AppResult<TokenPair> {
        let claims = verify_refresh_token(presented, &self.config.refresh_secret).map_err(|e| {
            debug!(stage = "decoded", error = %e, "refresh rejected");
            AppError::Unauthorized(describe_token_error(&e))
        })?;

        let user = self.store.find_by_id(claims.sub).await?.ok_or_else(|| {
            debug!(stage = "user_resolved", user_id = %claims.sub, "refresh rejected: unknown user");
            AppError::Unauthorized("Invalid refresh token".to_string())
        })?;

        if user.refresh_token.as_deref() != Some(presented) {
            debug!(stage = "matched", user_id = %user.id, "refresh rejected: stale token");
            return Err(AppError::Unauthorized(
                "Refresh token is expired or used".to_string(),
            ));
        }

        let pair = self.generate_token_pair(user.id).await?;
        debug!(stage = "rotated", user_id = %user.id, "refresh token rotated");
        Ok(pair)
    }

    /// Verify an access token against the access secret.
    pub fn verify_access(&self, token: &str) -> AppResult<AccessClaims> {
        verify_access_token(token, &self.config.access_secret)
            .map_err(|e| AppError::Unauthorized(describe_token_error(&e)))
    }
}

fn token_failure(user_id: Uuid, err: impl std::fmt::Display) -> AppError {
    error!(user_id = %user_id, error = %err, "token generation failed");
    AppError::Internal(anyhow::anyhow!(TOKEN_FAILURE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserStore;
    use crate::models::{NewUser, User};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> TokenConfig {
        TokenConfig {
            access_secret: "test-access-secret-min-32-chars!!".into(),
            access_ttl: Duration::minutes(15),
            refresh_secret: "test-refresh-secret-min-32-chars!".into(),
            refresh_ttl: Duration::days(10),
        }
    }

    fn new_user() -> NewUser {
        NewUser {
            username: "ada".into(),
            email: "ada@x.com".into(),
            fullname: "Ada Lovelace".into(),
            avatar: "https://cdn.example.com/ada.png".into(),
            cover_image: String::new(),
            password: "secret1".into(),
        }
    }

    async fn setup() -> (TokenService, Arc<MemoryUserStore>, User) {
        let store = Arc::new(MemoryUserStore::new());
        let user = store.create(new_user()).await.unwrap();
        (TokenService::new(store.clone(), config()), store, user)
    }

    /// Counts `find_by_id` calls so tests can prove a lookup never happened.
    struct CountingStore {
        inner: MemoryUserStore,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl UserStore for CountingStore {
        async fn find_by_email_or_username(
            &self,
            email: Option<&str>,
            username: Option<&str>,
        ) -> AppResult<Option<User>> {
            self.inner.find_by_email_or_username(email, username).await
        }

        async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_id(id).await
        }

        async fn create(&self, new_user: NewUser) -> AppResult<User> {
            self.inner.create(new_user).await
        }

        async fn update_by_id(
            &self,
            id: Uuid,
            patch: UserPatch,
            mode: WriteMode,
        ) -> AppResult<Option<User>> {
            self.inner.update_by_id(id, patch, mode).await
        }
    }

    #[tokio::test]
    async fn generate_persists_refresh_token() {
        let (service, store, user) = setup().await;
        let pair = service.generate_token_pair(user.id).await.unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(pair.refresh_token.as_str()));
        assert_eq!(service.verify_access(&pair.access_token).unwrap().sub, user.id);
    }

    #[tokio::test]
    async fn generate_for_unknown_user_is_not_found() {
        let (service, _, _) = setup().await;
        let err = service.generate_token_pair(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn generate_ignores_incomplete_profile() {
        let (service, store, user) = setup().await;
        let blank = UserPatch {
            fullname: Some(String::new()),
            ..UserPatch::default()
        };
        store
            .update_by_id(user.id, blank, WriteMode::SkipValidation)
            .await
            .unwrap();
        assert!(service.generate_token_pair(user.id).await.is_ok());
    }

    #[tokio::test]
    async fn each_pair_is_fresh() {
        let (service, _, user) = setup().await;
        let a = service.generate_token_pair(user.id).await.unwrap();
        let b = service.generate_token_pair(user.id).await.unwrap();
        assert_ne!(a.refresh_token, b.refresh_token);
        assert_ne!(a.access_token, b.access_token);
    }

    #[tokio::test]
    async fn rotate_replaces_stored_token_and_rejects_replay() {
        let (service, store, user) = setup().await;
        let first = service.generate_token_pair(user.id).await.unwrap();

        let second = service.rotate(Some(first.refresh_token.as_str())).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(second.refresh_token.as_str()));

        let err = service.rotate(Some(first.refresh_token.as_str())).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Refresh token is expired or used"));

        assert!(service.rotate(Some(second.refresh_token.as_str())).await.is_ok());
    }

    #[tokio::test]
    async fn rotate_without_token_is_unauthorized() {
        let (service, _, _) = setup().await;
        for presented in [None, Some("")] {
            let err = service.rotate(presented).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Unauthorized request"));
        }
    }

    #[tokio::test]
    async fn rotate_after_logout_fails() {
        let (service, store, user) = setup().await;
        let pair = service.generate_token_pair(user.id).await.unwrap();
        store
            .update_by_id(user.id, UserPatch::clear_refresh_token(), WriteMode::SkipValidation)
            .await
            .unwrap();
        let err = service.rotate(Some(pair.refresh_token.as_str())).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn rotate_for_deleted_user_is_unauthorized() {
        let (service, _, _) = setup().await;
        let orphan = sign_refresh_token(
            Uuid::new_v4(),
            &config().refresh_secret,
            config().refresh_ttl,
        )
        .unwrap();
        let err = service.rotate(Some(orphan.as_str())).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Invalid refresh token"));
    }

    #[tokio::test]
    async fn invalid_or_expired_token_never_reaches_store() {
        let inner = MemoryUserStore::new();
        let user = inner.create(new_user()).await.unwrap();
        let store = Arc::new(CountingStore {
            inner,
            lookups: AtomicUsize::new(0),
        });
        let service = TokenService::new(store.clone(), config());

        let expired =
            sign_refresh_token(user.id, &config().refresh_secret, Duration::hours(-2)).unwrap();
        let wrong_secret =
            sign_refresh_token(user.id, &config().access_secret, Duration::days(1)).unwrap();

        for (token, message) in [
            ("garbage", "jwt malformed"),
            (expired.as_str(), "jwt expired"),
            (wrong_secret.as_str(), "invalid signature"),
        ] {
            let err = service.rotate(Some(token)).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(ref m) if m == message));
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unrepresentable_lifetime_is_internal_and_keeps_stored_token() {
        let (service, store, user) = setup().await;
        let pair = service.generate_token_pair(user.id).await.unwrap();

        let broken = TokenService::new(
            store.clone(),
            TokenConfig {
                refresh_ttl: Duration::try_seconds(9_000_000_000_000).unwrap(),
                ..config()
            },
        );
        let err = broken.generate_token_pair(user.id).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(ref e) if e.to_string() == TOKEN_FAILURE));

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(pair.refresh_token.as_str()));
    }
}
