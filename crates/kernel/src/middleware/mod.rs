//! HTTP middleware components.

pub mod auth;

pub use auth::{CurrentUser, require_auth, session_user};
