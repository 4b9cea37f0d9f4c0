//! Static page model.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::content::{render_markdown, sanitize_html};

const COLUMNS: &str = "id, title, slug, content, content_type, visible, created_at, updated_at";

/// How a page's content is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Markdown,
    Html,
}

impl ContentType {
    /// Column value.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Markdown => "markdown",
            ContentType::Html => "html",
        }
    }

    /// Parse a column or form value; anything unknown is markdown.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "html" => ContentType::Html,
            _ => ContentType::Markdown,
        }
    }
}

/// Page record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub content_type: String,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or updating a page. The slug is already normalized.
#[derive(Debug, Clone)]
pub struct PageInput {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub content_type: ContentType,
    pub visible: bool,
}

impl Page {
    /// Rendered HTML body.
    pub fn render(&self) -> String {
        match ContentType::parse(&self.content_type) {
            ContentType::Markdown => render_markdown(&self.content),
            ContentType::Html => sanitize_html(&self.content),
        }
    }

    /// Create a page.
    pub async fn create(pool: &PgPool, input: &PageInput) -> Result<Self> {
        let page = sqlx::query_as::<_, Page>(&format!(
            r#"
            INSERT INTO pages (id, title, slug, content, content_type, visible)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.content)
        .bind(input.content_type.as_str())
        .bind(input.visible)
        .fetch_one(pool)
        .await
        .context("failed to create page")?;

        Ok(page)
    }

    /// Update a page.
    pub async fn update(pool: &PgPool, id: Uuid, input: &PageInput) -> Result<Option<Self>> {
        let page = sqlx::query_as::<_, Page>(&format!(
            r#"
            UPDATE pages
            SET title = $1, slug = $2, content = $3, content_type = $4, visible = $5,
                updated_at = now()
            WHERE id = $6
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.content)
        .bind(input.content_type.as_str())
        .bind(input.visible)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to update page")?;

        Ok(page)
    }

    /// Delete a page.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete page")?;

        Ok(result.rows_affected() > 0)
    }

    /// Find a page by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let page = sqlx::query_as::<_, Page>(&format!("SELECT {COLUMNS} FROM pages WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch page by id")?;

        Ok(page)
    }

    /// Find a page by slug.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let page =
            sqlx::query_as::<_, Page>(&format!("SELECT {COLUMNS} FROM pages WHERE slug = $1"))
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("failed to fetch page by slug")?;

        Ok(page)
    }

    /// All pages ordered by title.
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        let pages = sqlx::query_as::<_, Page>(&format!("SELECT {COLUMNS} FROM pages ORDER BY title"))
            .fetch_all(pool)
            .await
            .context("failed to list pages")?;

        Ok(pages)
    }

    /// Whether another page already uses this slug.
    pub async fn slug_taken(pool: &PgPool, slug: &str, except: Option<Uuid>) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pages WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(slug)
        .bind(except)
        .fetch_one(pool)
        .await
        .context("failed to check page slug")?;

        Ok(count.0 > 0)
    }
}
