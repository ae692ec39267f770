//! Account HTTP handlers: register, login, logout, refresh.

use axum::{
    extract::{Multipart, State},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::ValidateEmail;

use super::cookies::{cookie_value, with_token_cookies, without_token_cookies, REFRESH_COOKIE};
use super::TokenPair;
use crate::db::DUPLICATE_USER;
use crate::error::{AppError, AppResult};
use crate::handlers::http::AppState;
use crate::middleware::AuthUser;
use crate::models::{ApiResponse, NewUser, UserPatch, UserView, WriteMode};
use crate::upload::StagedForm;

const AVATAR_FIELD: &str = "avatar";
const COVER_IMAGE_FIELD: &str = "coverImage";
const REGISTER_TEXT_FIELDS: [&str; 4] = ["fullname", "email", "username", "password"];

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// POST /api/v1/users/register (multipart: text fields, `avatar`, optional `coverImage`)
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<UserView>> {
    let form = StagedForm::from_multipart(
        multipart,
        state.upload_dir(),
        &[AVATAR_FIELD, COVER_IMAGE_FIELD],
    )
    .await?;
    let result = register_user(&state, &form).await;
    form.discard().await;

    let user = result?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(ApiResponse::created(user, "User registered successfully"))
}

async fn register_user(state: &AppState, form: &StagedForm) -> AppResult<UserView> {
    let [fullname, email, username, password] =
        REGISTER_TEXT_FIELDS.map(|name| form.text(name).unwrap_or_default());
    if [fullname, email, username, password]
        .iter()
        .any(|value| value.trim().is_empty())
    {
        return Err(AppError::Validation("All fields are required".to_string()));
    }
    let (fullname, email, username) = (fullname.trim(), email.trim(), username.trim());
    if !email.validate_email() {
        return Err(AppError::Validation("Invalid email".to_string()));
    }

    if state
        .store()
        .find_by_email_or_username(Some(email), Some(username))
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(DUPLICATE_USER.to_string()));
    }

    let avatar_file = form
        .file(AVATAR_FIELD)
        .ok_or_else(|| AppError::Validation("Avatar file is required".to_string()))?;
    let avatar = state
        .uploader()
        .upload_asset(&avatar_file.path)
        .await
        .ok_or_else(|| AppError::Validation("Avatar file is required".to_string()))?;

    let cover_image = match form.file(COVER_IMAGE_FIELD) {
        Some(file) => state.uploader().upload_asset(&file.path).await,
        None => None,
    };

    let user = state
        .store()
        .create(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            fullname: fullname.to_string(),
            avatar: avatar.url,
            cover_image: cover_image.map(|asset| asset.url).unwrap_or_default(),
            password: password.to_string(),
        })
        .await?;

    Ok(user.view())
}

/// POST /api/v1/users/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, ApiResponse<LoginResponse>)> {
    let email = non_blank(body.email.as_deref());
    let username = non_blank(body.username.as_deref());
    if email.is_none() && username.is_none() {
        return Err(AppError::Validation(
            "username or email is required".to_string(),
        ));
    }

    let user = state
        .store()
        .find_by_email_or_username(email, username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !user.is_password_correct(body.password.as_deref().unwrap_or_default())? {
        return Err(AppError::Unauthorized("Password is incorrect".to_string()));
    }

    let pair = state.tokens().generate_token_pair(user.id).await?;
    info!(user_id = %user.id, "user logged in");

    let jar = with_token_cookies(jar, &pair);
    let body = LoginResponse {
        user: user.view(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };
    Ok((jar, ApiResponse::ok(body, "User logged in successfully")))
}

/// POST /api/v1/users/logout (authenticated)
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, ApiResponse<serde_json::Value>)> {
    state
        .store()
        .update_by_id(
            user.id,
            UserPatch::clear_refresh_token(),
            WriteMode::SkipValidation,
        )
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    info!(user_id = %user.id, "user logged out");

    Ok((
        without_token_cookies(jar),
        ApiResponse::ok(json!({}), "User logged out successfully"),
    ))
}

/// POST /api/v1/users/refresh (token from the `refreshToken` cookie or JSON body)
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> AppResult<(CookieJar, ApiResponse<TokenPair>)> {
    let presented = cookie_value(&jar, REFRESH_COOKIE).or_else(|| {
        body.and_then(|Json(b)| b.refresh_token)
            .filter(|t| !t.is_empty())
    });

    let pair = state.tokens().rotate(presented.as_deref()).await?;

    let jar = with_token_cookies(jar, &pair);
    Ok((jar, ApiResponse::ok(pair, "Access token refreshed successfully")))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
