//! Form support: CSRF protection and flash messages.

pub mod csrf;
pub mod flash;

pub use csrf::{CSRF_FIELD, generate_csrf_token, require_csrf, verify_csrf_token};
pub use flash::{Flash, FlashLevel, push_flash, take_flashes};
