//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::{Config, StorageConfig};
use crate::content::HighlightCss;
use crate::db;
use crate::file::{FileStorage, LocalFileStorage, MediaService};
use crate::theme::ThemeEngine;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Theme engine for template rendering.
    theme: ThemeEngine,

    /// Media uploads: storage backend plus records.
    media: MediaService,

    /// Stylesheet for highlighted code, generated on first request.
    highlight: HighlightCss,

    config: Config,
}

impl AppState {
    /// Connect to the database, apply migrations and open the configured
    /// storage backend.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        let storage = open_storage(&config.storage).await?;
        info!(backend = storage.scheme(), "media storage ready");

        let theme = ThemeEngine::new(&config.templates_dir)
            .context("failed to load templates")?;

        Ok(Self::from_parts(db, storage, theme, config.clone()))
    }

    /// Assemble state from already constructed parts.
    pub fn from_parts(
        db: PgPool,
        storage: Arc<dyn FileStorage>,
        theme: ThemeEngine,
        config: Config,
    ) -> Self {
        let media = MediaService::new(Arc::new(db.clone()), storage);
        let highlight = HighlightCss::new(config.highlight_style.clone());

        Self {
            inner: Arc::new(AppStateInner {
                db,
                theme,
                media,
                highlight,
                config,
            }),
        }
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get the theme engine.
    pub fn theme(&self) -> &ThemeEngine {
        &self.inner.theme
    }

    /// Get the media service.
    pub fn media(&self) -> &MediaService {
        &self.inner.media
    }

    /// Get the highlight stylesheet cache.
    pub fn highlight(&self) -> &HighlightCss {
        &self.inner.highlight
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Check if PostgreSQL is healthy.
    pub async fn postgres_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }
}

/// Open the storage backend named by the configuration.
pub async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn FileStorage>> {
    match config {
        StorageConfig::Local { path } => {
            let storage = LocalFileStorage::new(path)
                .await
                .with_context(|| format!("failed to open upload directory {}", path.display()))?;
            Ok(Arc::new(storage))
        }
        #[cfg(feature = "s3")]
        StorageConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key,
            secret_key,
        } => {
            use crate::file::{S3FileStorage, S3Settings};

            let storage = S3FileStorage::new(S3Settings {
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
            })
            .await
            .context("failed to configure S3 storage")?;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3 { .. } => {
            anyhow::bail!("S3 storage requested but quire was built without the `s3` feature")
        }
    }
}
