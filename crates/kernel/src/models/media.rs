//! Media record model.
//!
//! A record only exists for bytes a storage backend has accepted; see
//! [`crate::file::MediaService`] for the ordering rules.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::content::html_escape;

const COLUMNS: &str = "id, name, path, mime_type, size, description, created_at, updated_at";

/// Media record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: Uuid,
    /// Original file name as uploaded.
    pub name: String,
    /// Storage key.
    pub path: String,
    pub mime_type: String,
    pub size: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for a new media record.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub name: String,
    pub path: String,
    pub mime_type: String,
    pub size: i64,
    pub description: String,
}

impl Media {
    /// Public URL.
    pub fn url(&self) -> String {
        format!("/media/{}", self.path)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Whether browsers may render the file in place.
    ///
    /// SVG can carry script, so only raster images and audio/video qualify.
    pub fn serves_inline(&self) -> bool {
        (self.is_image() && self.mime_type != "image/svg+xml")
            || self.mime_type.starts_with("audio/")
            || self.mime_type.starts_with("video/")
    }

    /// `Content-Disposition` value for files that must be downloaded.
    pub fn content_disposition(&self) -> Option<String> {
        if self.serves_inline() {
            return None;
        }
        let filename: String = self
            .name
            .chars()
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .filter(|c| !matches!(c, '"' | '\\' | ';'))
            .collect();
        let filename = if filename.trim().is_empty() {
            "download".to_string()
        } else {
            filename.trim().to_string()
        };
        Some(format!("attachment; filename=\"{filename}\""))
    }

    /// Entity tag derived from modification time and size.
    pub fn etag(&self) -> String {
        format!("\"{:x}-{:x}\"", self.updated_at.timestamp(), self.size)
    }

    /// HTML snippet embedding the file.
    pub fn html_tag(&self) -> String {
        if self.is_image() {
            format!(
                "<img src=\"{}\" alt=\"{}\">",
                html_escape(&self.url()),
                html_escape(&self.name)
            )
        } else {
            format!(
                "<a href=\"{}\">{}</a>",
                html_escape(&self.url()),
                html_escape(&self.name)
            )
        }
    }

    /// Markdown snippet embedding the file.
    pub fn markdown_tag(&self) -> String {
        let label = self.name.replace(['[', ']'], "");
        if self.is_image() {
            format!("![{label}]({})", self.url())
        } else {
            format!("[{label}]({})", self.url())
        }
    }

    /// Insert a record.
    pub async fn create(pool: &PgPool, input: &NewMedia) -> Result<Self> {
        let media = sqlx::query_as::<_, Media>(&format!(
            r#"
            INSERT INTO media (id, name, path, mime_type, size, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&input.name)
        .bind(&input.path)
        .bind(&input.mime_type)
        .bind(input.size)
        .bind(&input.description)
        .fetch_one(pool)
        .await
        .context("failed to create media record")?;

        Ok(media)
    }

    /// Delete a record.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete media record")?;

        Ok(result.rows_affected() > 0)
    }

    /// Find a record by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let media = sqlx::query_as::<_, Media>(&format!("SELECT {COLUMNS} FROM media WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch media by id")?;

        Ok(media)
    }

    /// Find a record by storage key.
    pub async fn find_by_path(pool: &PgPool, path: &str) -> Result<Option<Self>> {
        let media =
            sqlx::query_as::<_, Media>(&format!("SELECT {COLUMNS} FROM media WHERE path = $1"))
                .bind(path)
                .fetch_optional(pool)
                .await
                .context("failed to fetch media by path")?;

        Ok(media)
    }

    /// All records, newest first.
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        let media = sqlx::query_as::<_, Media>(&format!(
            "SELECT {COLUMNS} FROM media ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
        .context("failed to list media")?;

        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn media(name: &str, mime_type: &str) -> Media {
        let at = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default();
        Media {
            id: Uuid::now_v7(),
            name: name.into(),
            path: "1700000000-logo.png".into(),
            mime_type: mime_type.into(),
            size: 4096,
            description: String::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn tags_depend_on_mime_type() {
        let image = media("logo.png", "image/png");
        assert_eq!(image.html_tag(), "<img src=\"/media/1700000000-logo.png\" alt=\"logo.png\">");
        assert_eq!(image.markdown_tag(), "![logo.png](/media/1700000000-logo.png)");

        let doc = media("cv [final].pdf", "application/pdf");
        assert!(doc.html_tag().starts_with("<a href="));
        assert_eq!(doc.markdown_tag(), "[cv final.pdf](/media/1700000000-logo.png)");
    }

    #[test]
    fn only_safe_types_render_inline() {
        assert!(media("a.png", "image/png").serves_inline());
        assert!(media("a.mp4", "video/mp4").serves_inline());
        assert_eq!(media("a.png", "image/png").content_disposition(), None);

        assert_eq!(
            media("drawing.svg", "image/svg+xml").content_disposition().as_deref(),
            Some("attachment; filename=\"drawing.svg\"")
        );
        assert_eq!(
            media("notes.txt", "text/plain").content_disposition().as_deref(),
            Some("attachment; filename=\"notes.txt\"")
        );
    }

    #[test]
    fn download_names_are_sanitized() {
        assert_eq!(
            media("a\"; evil=\\x.pdf", "application/pdf").content_disposition().as_deref(),
            Some("attachment; filename=\"a evil=x.pdf\"")
        );
        assert_eq!(
            media("résumé.pdf", "application/pdf").content_disposition().as_deref(),
            Some("attachment; filename=\"rsum.pdf\"")
        );
        assert_eq!(
            media("\u{1F600}", "application/zip").content_disposition().as_deref(),
            Some("attachment; filename=\"download\"")
        );
    }

    #[test]
    fn etag_is_quoted_hex() {
        assert_eq!(media("a", "image/png").etag(), "\"6553f100-1000\"");
    }
}
