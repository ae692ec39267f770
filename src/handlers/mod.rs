//! HTTP plumbing: application state and health.

pub mod http;

pub use http::{health, AppState};
