//! Data models: user record and response envelope.

pub mod response;
pub mod user;

pub use response::ApiResponse;
pub use user::{NewUser, User, UserPatch, UserView, WriteMode};
