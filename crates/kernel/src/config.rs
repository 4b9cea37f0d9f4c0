//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Default syntax highlighting style.
pub const DEFAULT_HIGHLIGHT_STYLE: &str = "InspiredGitHub";

/// Storage backend selection for uploaded media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Files live under a directory on local disk.
    Local { path: PathBuf },

    /// Files live in an S3-compatible bucket.
    S3 {
        bucket: String,
        region: String,
        /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
        endpoint: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
    },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Path to templates directory (default: ./templates).
    pub templates_dir: PathBuf,

    /// Media storage backend (default: local ./uploads).
    pub storage: StorageConfig,

    /// Syntect theme used for code highlighting (default: InspiredGitHub).
    pub highlight_style: String,

    /// Whether session cookies carry the Secure flag (default: true).
    pub secure_cookies: bool,

    /// Cookie SameSite policy: "strict", "lax", or "none" (default: "lax").
    pub cookie_same_site: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let templates_dir = env::var("TEMPLATES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./templates"));

        let storage = storage_from_env()?;

        let highlight_style =
            env::var("HIGHLIGHT_STYLE").unwrap_or_else(|_| DEFAULT_HIGHLIGHT_STYLE.to_string());

        let secure_cookies = env::var("SECURE_COOKIES")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        let cookie_same_site = env::var("COOKIE_SAME_SITE")
            .unwrap_or_else(|_| "lax".to_string())
            .to_lowercase();

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            templates_dir,
            storage,
            highlight_style,
            secure_cookies,
            cookie_same_site,
        })
    }
}

fn storage_from_env() -> Result<StorageConfig> {
    let provider = env::var("STORAGE_PROVIDER")
        .unwrap_or_else(|_| "local".to_string())
        .to_lowercase();

    match provider.as_str() {
        "local" => {
            let path = env::var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads"));
            Ok(StorageConfig::Local { path })
        }
        "s3" => {
            let bucket = env::var("S3_BUCKET")
                .context("S3_BUCKET is required when STORAGE_PROVIDER=s3")?;
            let region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
            Ok(StorageConfig::S3 {
                bucket,
                region,
                endpoint: non_empty_var("S3_ENDPOINT"),
                access_key: non_empty_var("S3_ACCESS_KEY"),
                secret_key: non_empty_var("S3_SECRET_KEY"),
            })
        }
        other => bail!("unsupported STORAGE_PROVIDER: {other} (expected \"local\" or \"s3\")"),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
