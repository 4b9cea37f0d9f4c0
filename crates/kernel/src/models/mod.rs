//! Database models.

pub mod media;
pub mod menu_item;
pub mod page;
pub mod post;
pub mod settings;
pub mod tag;
pub mod user;

pub use media::{Media, NewMedia};
pub use menu_item::{MenuItem, MenuItemInput};
pub use page::{ContentType, Page, PageInput};
pub use post::{Post, PostInput};
pub use settings::Settings;
pub use tag::{Tag, TagWithCount};
pub use user::{CreateUser, UpdateUser, User};
