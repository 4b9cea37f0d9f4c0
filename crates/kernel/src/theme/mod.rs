//! Template rendering.

mod engine;

pub use engine::{DEFAULT_DATE_FORMAT, ThemeEngine, format_date};
