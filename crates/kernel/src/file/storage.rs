//! File storage backends.
//!
//! Provides a trait and implementations for storing uploaded media on local
//! disk or in an S3-compatible bucket.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::content::slug::slugify_filename;

/// Errors reported by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object is stored under the key.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The key is empty or could escape the storage root.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("storage I/O error for {key}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether the error only reports that the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// File storage backend trait.
///
/// Keys are opaque to callers: `save` assigns one and the others accept it
/// back unchanged.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist `data` under a key derived from `name` and return the key.
    async fn save(&self, name: &str, data: &[u8]) -> Result<String, StorageError>;

    /// Read the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove the object stored under `key`.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Store `data` under a fixed `key`, replacing any previous object.
    ///
    /// Used for site assets with well-known names such as `favicon.ico`.
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Get the storage scheme (e.g., "local", "s3").
    fn scheme(&self) -> &'static str;
}

/// Build a storage key for an upload named `name` at `unix_seconds`.
///
/// Keys look like `1700000000-my-photo.jpg`: the base name is slugified and
/// the extension kept, lowercased and stripped of anything but ASCII
/// alphanumerics.
pub fn generate_key(name: &str, unix_seconds: i64) -> String {
    // Only the final path component counts; browsers may send full paths.
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let path = Path::new(file_name);

    let base = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let ext: String = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            e.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .unwrap_or_default();

    let mut slug = slugify_filename(base);
    if slug.is_empty() {
        slug = "file".to_string();
    }

    if ext.is_empty() {
        format!("{unix_seconds}-{slug}")
    } else {
        format!("{unix_seconds}-{slug}.{ext}")
    }
}

/// Keys to try for an upload, in order: `key` itself, then `stem-1.ext`,
/// `stem-2.ext` and so on.
pub fn candidate_keys(key: &str) -> impl Iterator<Item = String> + '_ {
    let (stem, ext) = match key.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (key, None),
    };
    std::iter::once(key.to_string()).chain((1..MAX_KEY_ATTEMPTS).map(move |n| match ext {
        Some(ext) => format!("{stem}-{n}.{ext}"),
        None => format!("{stem}-{n}"),
    }))
}

/// Upper bound on suffixed keys tried before giving up.
const MAX_KEY_ATTEMPTS: u32 = 1000;

/// Reject keys that are empty or could address anything outside the root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.contains(['/', '\\', '\0'])
        || key.contains("..")
        || key.starts_with('.');
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Local filesystem storage.
pub struct LocalFileStorage {
    /// Base path for file storage.
    base_path: PathBuf,
}

impl LocalFileStorage {
    /// Create a local storage rooted at `base_path`, creating the directory
    /// when missing.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)
            .await
            .map_err(|source| StorageError::Io {
                key: base_path.display().to_string(),
                source,
            })?;
        Ok(Self { base_path })
    }

    /// Directory files are stored in.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    /// Write `data` to a hidden temporary sibling and flush it.
    async fn write_temp(&self, key: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        let tmp = self
            .base_path
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::now_v7().simple()));
        let written = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        match written {
            Ok(()) => Ok(tmp),
            Err(source) => {
                let _ = fs::remove_file(&tmp).await;
                Err(StorageError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    /// Link the finished temporary file under the first free candidate key.
    ///
    /// `hard_link` fails when the target exists, so a key is claimed by
    /// exactly one writer even when uploads of the same name race.
    async fn claim_key(&self, tmp: &Path, key: &str) -> Result<String, StorageError> {
        for candidate in candidate_keys(key) {
            let path = self.resolve(&candidate)?;
            match fs::hard_link(tmp, &path).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(StorageError::Io {
                        key: candidate,
                        source,
                    });
                }
            }
        }
        Err(StorageError::Backend(format!("no free storage key for {key}")))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StorageError {
    if source.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save(&self, name: &str, data: &[u8]) -> Result<String, StorageError> {
        let key = generate_key(name, chrono::Utc::now().timestamp());

        // Readers never observe a partially written file: bytes go to a
        // hidden sibling which is then linked under its final name.
        let tmp = self.write_temp(&key, data).await?;
        let claimed = self.claim_key(&tmp, &key).await;
        if let Err(e) = fs::remove_file(&tmp).await {
            warn!(path = ?tmp, error = %e, "failed to remove temporary upload file");
        }
        let key = claimed?;

        debug!(key = %key, size = data.len(), "file written");
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        let data = fs::read(&path).await.map_err(|e| io_error(key, e))?;
        debug!(key = %key, size = data.len(), "file read");
        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        fs::remove_file(&path).await.map_err(|e| io_error(key, e))?;
        debug!(key = %key, "file deleted");
        Ok(())
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        let tmp = self.write_temp(key, data).await?;
        if let Err(source) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::Io {
                key: key.to_string(),
                source,
            });
        }
        debug!(key = %key, size = data.len(), "file replaced");
        Ok(())
    }

    fn scheme(&self) -> &'static str {
        "local"
    }
}

impl std::fmt::Debug for LocalFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStorage")
            .field("base_path", &self.base_path)
            .finish()
    }
}

/// Connection settings for [`S3FileStorage`].
#[cfg(feature = "s3")]
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services; enables path-style
    /// addressing.
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// S3-compatible object storage.
#[cfg(feature = "s3")]
pub struct S3FileStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

#[cfg(feature = "s3")]
impl S3FileStorage {
    /// Create a new S3 file storage.
    ///
    /// Static credentials are used when both keys are given; otherwise the
    /// default AWS credential chain applies (env vars, config file, instance
    /// profile).
    pub async fn new(settings: S3Settings) -> Result<Self, StorageError> {
        use aws_config::BehaviorVersion;
        use aws_sdk_s3::config::{Credentials, Region};

        if settings.bucket.trim().is_empty() {
            return Err(StorageError::Backend("S3 bucket name is empty".into()));
        }

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region));
        if let (Some(access), Some(secret)) = (settings.access_key, settings.secret_key) {
            loader =
                loader.credentials_provider(Credentials::new(access, secret, None, None, "quire"));
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.endpoint.is_some())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket: settings.bucket,
        })
    }
}

#[cfg(feature = "s3")]
#[async_trait]
impl FileStorage for S3FileStorage {
    async fn save(&self, name: &str, data: &[u8]) -> Result<String, StorageError> {
        let key = generate_key(name, chrono::Utc::now().timestamp());

        // `If-None-Match: *` makes the write fail with 412 instead of
        // replacing an object another upload already claimed.
        for candidate in candidate_keys(&key) {
            let result = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&candidate)
                .if_none_match("*")
                .body(aws_sdk_s3::primitives::ByteStream::from(data.to_vec()))
                .send()
                .await;

            match result {
                Ok(_) => {
                    debug!(key = %candidate, size = data.len(), "file written to S3");
                    return Ok(candidate);
                }
                Err(err) if err.raw_response().map(|r| r.status().as_u16()) == Some(412) => {
                    continue;
                }
                Err(err) => return Err(StorageError::Backend(format!("S3 upload failed: {err}"))),
            }
        }
        Err(StorageError::Backend(format!("no free storage key for {key}")))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    return Err(StorageError::NotFound(key.to_string()));
                }
                return Err(StorageError::Backend(format!("S3 get failed: {err}")));
            }
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("failed to read S3 body: {e}")))?
            .into_bytes()
            .to_vec();

        debug!(key = %key, size = data.len(), "file read from S3");
        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;

        // S3 deletes succeed for missing objects, so check first to report
        // absence like the local backend does.
        if let Err(err) = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                return Err(StorageError::NotFound(key.to_string()));
            }
            return Err(StorageError::Backend(format!("S3 head failed: {err}")));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 delete failed: {e}")))?;

        debug!(key = %key, "file deleted from S3");
        Ok(())
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 upload failed: {e}")))?;

        debug!(key = %key, size = data.len(), "file replaced in S3");
        Ok(())
    }

    fn scheme(&self) -> &'static str {
        "s3"
    }
}

#[cfg(feature = "s3")]
impl std::fmt::Debug for S3FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3FileStorage")
            .field("bucket", &self.bucket)
            .finish()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn key_has_timestamp_slug_and_extension() {
        assert_eq!(
            generate_key("My Holiday Photo.JPG", 1_700_000_000),
            "1700000000-my-holiday-photo.jpg"
        );
    }

    #[test]
    fn key_strips_directories() {
        let key = generate_key("../../etc/passwd", 42);
        assert_eq!(key, "42-passwd");
        let key = generate_key("C:\\Users\\me\\cv.pdf", 42);
        assert_eq!(key, "42-cv.pdf");
    }

    #[test]
    fn key_falls_back_to_file() {
        assert_eq!(generate_key("???.png", 7), "7-file.png");
        assert_eq!(generate_key("", 7), "7-file");
    }

    #[test]
    fn generated_keys_are_valid() {
        for name in ["a.b.c", "..", ".hidden", "x/../../y.txt", "résumé.pdf"] {
            let key = generate_key(name, 1);
            assert!(validate_key(&key).is_ok(), "{name} -> {key}");
        }
    }

    #[test]
    fn candidates_add_numeric_suffixes() {
        let keys: Vec<_> = candidate_keys("42-notes.txt").take(3).collect();
        assert_eq!(keys, ["42-notes.txt", "42-notes-1.txt", "42-notes-2.txt"]);

        let keys: Vec<_> = candidate_keys("42-file").take(2).collect();
        assert_eq!(keys, ["42-file", "42-file-1"]);
        assert_eq!(candidate_keys("42-file").count(), MAX_KEY_ATTEMPTS as usize);
    }

    #[test]
    fn traversal_keys_are_rejected() {
        for key in ["", "../x", "a/b", "a\\b", ".env", "x\0y"] {
            assert!(matches!(
                validate_key(key),
                Err(StorageError::InvalidKey(_))
            ));
        }
    }
}
