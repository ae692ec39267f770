//! Access-token authentication for protected routes.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tracing::debug;

use crate::auth::{cookie_value, ACCESS_COOKIE};
use crate::error::AppError;
use crate::handlers::http::AppState;
use crate::models::User;

/// Extractor: the user named by a valid access token, taken from the
/// `accessToken` cookie or an `Authorization: Bearer` header.
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = match cookie_value(&jar, ACCESS_COOKIE) {
            Some(token) => Some(token),
            None => TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .ok()
                .map(|TypedHeader(auth)| auth.token().to_string()),
        };
        let token = token.ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;

        let claims = state.tokens().verify_access(&token)?;
        let user = state.store().find_by_id(claims.sub).await?.ok_or_else(|| {
            debug!(user_id = %claims.sub, "access token names unknown user");
            AppError::Unauthorized("Invalid access token".to_string())
        })?;
        Ok(AuthUser(user))
    }
}
