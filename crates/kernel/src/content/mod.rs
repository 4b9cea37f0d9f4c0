//! Content rendering.
//!
//! This module provides:
//! - Markdown rendering with sanitization and heading ids
//! - Code block highlighting and the matching stylesheet cache
//! - Excerpt derivation for list views
//! - Slug normalization

pub mod escape;
pub mod excerpt;
pub mod highlight;
pub mod markdown;
pub mod slug;

pub use escape::html_escape;
pub use excerpt::{DEFAULT_EXCERPT_CHARS, derive_excerpt};
pub use highlight::{HighlightCss, Stylesheet, available_styles, is_known_style};
pub use markdown::{render_markdown, sanitize_html};
pub use slug::{slugify, slugify_filename};
