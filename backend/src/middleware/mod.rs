//! HTTP middleware

pub mod audit;
pub mod auth;

pub use audit::audit_middleware;
pub use auth::{auth_middleware, optional_auth_middleware, AuthUser, CurrentUser};
