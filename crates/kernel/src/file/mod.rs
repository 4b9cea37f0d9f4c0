//! File and media management.
//!
//! Provides the storage backends, the service that keeps stored bytes
//! and media records in step, and favicon generation from the site logo.

pub mod favicon;
pub mod service;
pub mod storage;

pub use favicon::{FAVICON_ASSETS, FaviconAsset, favicon_asset, render_favicons};
pub use service::{ALLOWED_MIME_TYPES, MAX_FILE_SIZE, MediaError, MediaRecords, MediaService, Upload};
pub use storage::{FileStorage, LocalFileStorage, StorageError};

#[cfg(feature = "s3")]
pub use storage::{S3FileStorage, S3Settings};
