//! Authentication: password hashing, token pair issuance and rotation, account handlers.

mod cookies;
mod handlers;
mod jwt;
mod password;
mod service;

pub use cookies::{cookie_value, ACCESS_COOKIE, REFRESH_COOKIE};
pub use handlers::{login, logout, refresh, register};
pub use jwt::{
    describe_token_error, sign_access_token, sign_refresh_token, verify_access_token,
    verify_refresh_token, AccessClaims, RefreshClaims, TokenConfig,
};
pub use password::{hash_password, verify_password};
pub use service::{TokenPair, TokenService};
