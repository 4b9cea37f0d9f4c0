//! Media management service.
//!
//! Keeps storage and the `media` table consistent: bytes are stored before
//! a record is written, and a record is removed only after its bytes are
//! gone.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::storage::{FileStorage, StorageError};
use crate::models::{Media, NewMedia};

/// Maximum upload size (32 MB).
pub const MAX_FILE_SIZE: usize = 32 * 1024 * 1024;

/// Allowed MIME types for upload.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    // Images
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/avif",
    "image/x-icon",
    "image/svg+xml",
    // Documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "text/markdown",
    "text/csv",
    // Archives
    "application/zip",
    "application/gzip",
    // Audio and video
    "audio/mpeg",
    "audio/ogg",
    "video/mp4",
    "video/webm",
];

/// Media operation errors.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("no file was uploaded")]
    Empty,

    #[error("file too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("file type not allowed: {0}")]
    UnsupportedType(String),

    #[error("media not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("media record error")]
    Record(#[from] anyhow::Error),
}

/// An uploaded file.
#[derive(Debug)]
pub struct Upload<'a> {
    pub file_name: &'a str,
    /// Content type reported by the client, if any.
    pub content_type: Option<&'a str>,
    pub description: &'a str,
    pub data: &'a [u8],
}

/// Persistence for media records.
///
/// PostgreSQL in production; tests swap in an in-memory table.
#[async_trait]
pub trait MediaRecords: Send + Sync {
    async fn create(&self, input: &NewMedia) -> anyhow::Result<Media>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Media>>;
    async fn find_by_path(&self, path: &str) -> anyhow::Result<Option<Media>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
impl MediaRecords for PgPool {
    async fn create(&self, input: &NewMedia) -> anyhow::Result<Media> {
        Media::create(self, input).await
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Media>> {
        Media::find_by_id(self, id).await
    }

    async fn find_by_path(&self, path: &str) -> anyhow::Result<Option<Media>> {
        Media::find_by_path(self, path).await
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Media::delete(self, id).await
    }
}

/// Media service coordinating storage and records.
pub struct MediaService {
    records: Arc<dyn MediaRecords>,
    storage: Arc<dyn FileStorage>,
}

impl MediaService {
    /// Create a new media service.
    pub fn new(records: Arc<dyn MediaRecords>, storage: Arc<dyn FileStorage>) -> Self {
        Self { records, storage }
    }

    /// Store an upload and record it.
    ///
    /// If the record cannot be written the stored bytes are deleted again
    /// before the error is returned.
    pub async fn upload(&self, upload: Upload<'_>) -> Result<Media, MediaError> {
        if upload.data.is_empty() {
            return Err(MediaError::Empty);
        }
        if upload.data.len() > MAX_FILE_SIZE {
            return Err(MediaError::TooLarge {
                size: upload.data.len(),
                max: MAX_FILE_SIZE,
            });
        }

        let mime_type = detect_mime_type(upload.file_name, upload.content_type, upload.data);
        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            warn!(name = %upload.file_name, mime = %mime_type, "rejected upload type");
            return Err(MediaError::UnsupportedType(mime_type));
        }

        let key = self.storage.save(upload.file_name, upload.data).await?;

        let record = NewMedia {
            name: upload.file_name.to_string(),
            path: key.clone(),
            mime_type,
            size: i64::try_from(upload.data.len()).unwrap_or(i64::MAX),
            description: upload.description.trim().to_string(),
        };

        match self.records.create(&record).await {
            Ok(media) => {
                info!(
                    media_id = %media.id,
                    key = %key,
                    size = media.size,
                    backend = self.storage.scheme(),
                    "media uploaded"
                );
                Ok(media)
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&key).await {
                    error!(key = %key, error = %cleanup, "failed to remove orphaned upload");
                }
                Err(MediaError::Record(e))
            }
        }
    }

    /// Delete a media file and its record.
    ///
    /// Bytes that are already gone do not block removing the record; any
    /// other storage failure keeps the record in place.
    pub async fn delete(&self, id: Uuid) -> Result<Media, MediaError> {
        let media = self
            .records
            .find_by_id(id)
            .await?
            .ok_or(MediaError::NotFound)?;

        match self.storage.delete(&media.path).await {
            Ok(()) => {}
            Err(StorageError::NotFound(key)) => {
                warn!(media_id = %id, key = %key, "media file already missing; removing record");
            }
            Err(e) => return Err(e.into()),
        }

        self.records.delete(id).await?;
        info!(media_id = %id, key = %media.path, "media deleted");
        Ok(media)
    }

    /// Record for an id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Media, MediaError> {
        self.records
            .find_by_id(id)
            .await?
            .ok_or(MediaError::NotFound)
    }

    /// Record and bytes for a storage key.
    pub async fn fetch(&self, path: &str) -> Result<(Media, Vec<u8>), MediaError> {
        let media = self.find(path).await?;
        let data = self.read(&media).await?;
        Ok((media, data))
    }

    /// Bytes of a known record.
    pub async fn read(&self, media: &Media) -> Result<Vec<u8>, MediaError> {
        Ok(self.storage.get(&media.path).await?)
    }

    /// Record for a storage key, without reading the bytes.
    pub async fn find(&self, path: &str) -> Result<Media, MediaError> {
        self.records
            .find_by_path(path)
            .await?
            .ok_or(MediaError::NotFound)
    }

    /// Replace a site asset stored under a well-known name.
    pub async fn store_asset(&self, name: &str, data: &[u8]) -> Result<(), MediaError> {
        self.storage.put(name, data).await?;
        info!(asset = %name, size = data.len(), "site asset stored");
        Ok(())
    }

    /// Bytes of a site asset.
    pub async fn read_asset(&self, name: &str) -> Result<Vec<u8>, MediaError> {
        Ok(self.storage.get(name).await?)
    }

    /// Remove a site asset; a missing asset is not an error.
    pub async fn remove_asset(&self, name: &str) -> Result<(), MediaError> {
        match self.storage.delete(name).await {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Active storage backend name.
    pub fn backend(&self) -> &'static str {
        self.storage.scheme()
    }
}

impl std::fmt::Debug for MediaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaService")
            .field("backend", &self.storage.scheme())
            .finish()
    }
}

/// Guess a MIME type from a file name extension.
pub fn guess_mime_type(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

/// Pick the MIME type for an upload.
///
/// The extension wins, then the file's magic bytes, then whatever the
/// client claimed. The result still has to pass [`ALLOWED_MIME_TYPES`].
pub fn detect_mime_type(filename: &str, supplied: Option<&str>, data: &[u8]) -> String {
    if let Some(mime) = guess_mime_type(filename).or_else(|| infer::get(data).map(|k| k.mime_type()))
    {
        return mime.to_string();
    }
    supplied
        .map(|s| s.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    /// In-memory blob store whose deletes can be made to fail.
    #[derive(Default)]
    struct MemoryStorage {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
        failing_delete: bool,
    }

    impl MemoryStorage {
        fn keys(&self) -> Vec<String> {
            self.blobs.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl FileStorage for MemoryStorage {
        async fn save(&self, name: &str, data: &[u8]) -> Result<String, StorageError> {
            let key = format!("1700000000-{name}");
            self.blobs.lock().unwrap().insert(key.clone(), data.to_vec());
            Ok(key)
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            self.blobs
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(key.to_string()))
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            if self.failing_delete {
                return Err(StorageError::Backend("bucket unreachable".into()));
            }
            self.blobs
                .lock()
                .unwrap()
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| StorageError::NotFound(key.to_string()))
        }

        async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
            self.blobs.lock().unwrap().insert(key.to_string(), data.to_vec());
            Ok(())
        }

        fn scheme(&self) -> &'static str {
            "memory"
        }
    }

    /// In-memory media table whose inserts can be made to fail.
    #[derive(Default)]
    struct MemoryRecords {
        rows: Mutex<Vec<Media>>,
        failing_insert: bool,
    }

    impl MemoryRecords {
        fn insert(&self, path: &str) -> Media {
            let now = Utc::now();
            let media = Media {
                id: Uuid::now_v7(),
                name: path.to_string(),
                path: path.to_string(),
                mime_type: "image/png".to_string(),
                size: 4,
                description: String::new(),
                created_at: now,
                updated_at: now,
            };
            self.rows.lock().unwrap().push(media.clone());
            media
        }

        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MediaRecords for MemoryRecords {
        async fn create(&self, input: &NewMedia) -> anyhow::Result<Media> {
            if self.failing_insert {
                anyhow::bail!("duplicate key value violates unique constraint");
            }
            let mut media = self.insert(&input.path);
            media.name = input.name.clone();
            media.mime_type = input.mime_type.clone();
            Ok(media)
        }

        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Media>> {
            Ok(self.rows.lock().unwrap().iter().find(|m| m.id == id).cloned())
        }

        async fn find_by_path(&self, path: &str) -> anyhow::Result<Option<Media>> {
            Ok(self.rows.lock().unwrap().iter().find(|m| m.path == path).cloned())
        }

        async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|m| m.id != id);
            Ok(rows.len() < before)
        }
    }

    fn service(records: &Arc<MemoryRecords>, storage: &Arc<MemoryStorage>) -> MediaService {
        MediaService::new(records.clone(), storage.clone())
    }

    fn png_upload(name: &str) -> Upload<'_> {
        Upload {
            file_name: name,
            content_type: Some("image/png"),
            description: " logo ",
            data: PNG_MAGIC,
        }
    }

    #[tokio::test]
    async fn upload_stores_bytes_then_record() {
        let records = Arc::new(MemoryRecords::default());
        let storage = Arc::new(MemoryStorage::default());

        let media = service(&records, &storage).upload(png_upload("logo.png")).await.unwrap();

        assert_eq!(media.mime_type, "image/png");
        assert_eq!(records.len(), 1);
        assert_eq!(storage.keys(), vec![media.path]);
    }

    #[tokio::test]
    async fn failed_insert_removes_saved_bytes() {
        let records = Arc::new(MemoryRecords {
            failing_insert: true,
            ..MemoryRecords::default()
        });
        let storage = Arc::new(MemoryStorage::default());

        let err = service(&records, &storage)
            .upload(png_upload("logo.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Record(_)));
        assert!(storage.keys().is_empty());
        assert_eq!(records.len(), 0);
    }

    #[tokio::test]
    async fn missing_bytes_do_not_block_record_removal() {
        let records = Arc::new(MemoryRecords::default());
        let storage = Arc::new(MemoryStorage::default());
        let media = records.insert("1700000000-gone.png");

        let deleted = service(&records, &storage).delete(media.id).await.unwrap();

        assert_eq!(deleted.id, media.id);
        assert_eq!(records.len(), 0);
    }

    #[tokio::test]
    async fn storage_failure_keeps_the_record() {
        let records = Arc::new(MemoryRecords::default());
        let storage = Arc::new(MemoryStorage {
            failing_delete: true,
            ..MemoryStorage::default()
        });
        let media = records.insert("1700000000-kept.png");
        storage.put(&media.path, b"png").await.unwrap();

        let err = service(&records, &storage).delete(media.id).await.unwrap_err();

        assert!(matches!(err, MediaError::Storage(StorageError::Backend(_))));
        assert_eq!(records.len(), 1);
        assert_eq!(storage.keys(), vec![media.path]);
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_not_found() {
        let records = Arc::new(MemoryRecords::default());
        let storage = Arc::new(MemoryStorage::default());
        let err = service(&records, &storage).delete(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, MediaError::NotFound));
    }

    #[tokio::test]
    async fn disallowed_types_are_rejected_before_storing() {
        let records = Arc::new(MemoryRecords::default());
        let storage = Arc::new(MemoryStorage::default());
        let upload = Upload {
            file_name: "page.html",
            content_type: Some("text/html"),
            description: "",
            data: b"<html><script>alert(1)</script></html>",
        };

        let err = service(&records, &storage).upload(upload).await.unwrap_err();

        assert!(matches!(err, MediaError::UnsupportedType(ref mime) if mime == "text/html"));
        assert!(storage.keys().is_empty());
        assert_eq!(records.len(), 0);
    }

    #[tokio::test]
    async fn empty_and_oversized_uploads_are_refused() {
        let records = Arc::new(MemoryRecords::default());
        let storage = Arc::new(MemoryStorage::default());
        let media = service(&records, &storage);

        let empty = Upload {
            data: b"",
            ..png_upload("a.png")
        };
        assert!(matches!(media.upload(empty).await, Err(MediaError::Empty)));

        let big = vec![0u8; MAX_FILE_SIZE + 1];
        let oversized = Upload {
            data: &big,
            ..png_upload("a.png")
        };
        assert!(matches!(media.upload(oversized).await, Err(MediaError::TooLarge { .. })));
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn assets_replace_and_tolerate_absence() {
        let records = Arc::new(MemoryRecords::default());
        let storage = Arc::new(MemoryStorage::default());
        let media = service(&records, &storage);

        media.store_asset("favicon.ico", b"one").await.unwrap();
        media.store_asset("favicon.ico", b"two").await.unwrap();
        assert_eq!(media.read_asset("favicon.ico").await.unwrap(), b"two");

        media.remove_asset("favicon.ico").await.unwrap();
        media.remove_asset("favicon.ico").await.unwrap();
        assert!(matches!(
            media.read_asset("favicon.ico").await,
            Err(MediaError::Storage(StorageError::NotFound(_)))
        ));
    }

    #[test]
    fn client_type_cannot_override_the_extension() {
        assert_eq!(
            detect_mime_type("x.jpg", Some("text/html"), b"<script>alert(1)</script>"),
            "image/jpeg"
        );
        assert_eq!(detect_mime_type("a.png", Some("image/webp"), b""), "image/png");
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(
            detect_mime_type("a.pdf", Some("application/octet-stream"), b""),
            "application/pdf"
        );
        assert_eq!(detect_mime_type("a.JPG", Some(""), b""), "image/jpeg");
    }

    #[test]
    fn magic_bytes_when_extension_unknown() {
        assert_eq!(detect_mime_type("upload", None, PNG_MAGIC), "image/png");
    }

    #[test]
    fn unknown_content_is_not_allowed() {
        let mime = detect_mime_type("data.bin", None, b"\x00\x01");
        assert_eq!(mime, "application/octet-stream");
        assert!(!ALLOWED_MIME_TYPES.contains(&mime.as_str()));

        let mime = detect_mime_type("page", Some("text/html; charset=utf-8"), b"");
        assert_eq!(mime, "text/html");
        assert!(!ALLOWED_MIME_TYPES.contains(&mime.as_str()));
    }
}
