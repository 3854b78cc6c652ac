pub mod auth;
pub mod admin;

pub use auth::{AuthError, AuthGuard};
pub use admin::AdminGuard;
