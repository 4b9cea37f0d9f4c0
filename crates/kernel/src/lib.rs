//! Quire blog kernel library.
//!
//! Everything the `quire` binary serves, exposed for integration testing.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod file;
pub mod form;
pub mod menu;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod theme;
pub mod validation;

pub use config::Config;
pub use state::AppState;
