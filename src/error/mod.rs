//! Application error types: one tagged error per failure kind, rendered at the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Message used when a refresh failure has no client-safe message of its own.
pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse classification of [`AppError`], one per HTTP status the service emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationError,
    Unauthorized,
    NotFound,
    Conflict,
    InternalError,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::ValidationError,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Db(_) | AppError::Internal(_) => ErrorKind::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Re-surface any failure as `Unauthorized`, keeping the message when it is
    /// safe to show a client. Store and internal failures collapse to
    /// [`INVALID_REFRESH_TOKEN`].
    pub fn into_unauthorized(self) -> AppError {
        match self {
            AppError::Validation(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
                if !msg.is_empty() =>
            {
                AppError::Unauthorized(msg)
            }
            _ => AppError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()),
        }
    }

    /// Map a unique-constraint violation to `Conflict`; anything else stays a database error.
    pub fn from_write(err: sqlx::Error, conflict_message: &str) -> AppError {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(conflict_message.to_string())
            }
            _ => AppError::Db(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "statusCode": status.as_u16(),
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_kind() {
        assert_eq!(
            AppError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Db(sqlx::Error::RowNotFound).kind(),
            ErrorKind::InternalError
        );
    }

    #[test]
    fn into_unauthorized_keeps_domain_message() {
        let err = AppError::NotFound("User not found".into()).into_unauthorized();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.to_string(), "User not found");
    }

    #[test]
    fn into_unauthorized_hides_internal_detail() {
        let err = AppError::Db(sqlx::Error::PoolTimedOut).into_unauthorized();
        assert_eq!(err.to_string(), INVALID_REFRESH_TOKEN);

        let err = AppError::Unauthorized(String::new()).into_unauthorized();
        assert_eq!(err.to_string(), INVALID_REFRESH_TOKEN);
    }

    #[tokio::test]
    async fn response_body_has_uniform_shape() {
        let res = AppError::Conflict("taken".into()).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["statusCode"], 409);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "taken");
    }
}
