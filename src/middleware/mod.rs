//! Request authentication shared by protected routes.

pub mod auth;

pub use auth::AuthUser;
