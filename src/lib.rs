//! User accounts with rotating access/refresh token sessions.
//!
//! Registration stages avatar and cover images and hands them to an external
//! image host; login issues an access/refresh token pair; refresh rotates the
//! pair and rejects any refresh token that has already been rotated away.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod upload;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use handlers::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

/// Largest multipart body accepted by registration.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Build the API router (health, account routes). Used by main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let user_routes = axum::Router::new()
        .route(
            "/register",
            post(auth::register).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/refresh", post(auth::refresh));

    axum::Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1/users", user_routes)
        .with_state(state)
}
