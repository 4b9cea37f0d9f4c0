//! Tag model.
//!
//! Tags are unique by both name and slug. Posts reference them through the
//! `post_tags` join table.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::content::slug::slugify;

/// Tag record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Tag with the number of posts using it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TagWithCount {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub post_count: i64,
}

impl Tag {
    /// Trimmed display name and slug for a tag input.
    ///
    /// Returns `None` when nothing usable remains.
    pub fn normalize(name: &str, slug: Option<&str>) -> Option<(String, String)> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let slug = crate::content::slug::slug_or_derive(slug, name);
        if slug.is_empty() {
            return None;
        }
        Some((name.to_string(), slug))
    }

    /// Split a comma separated tag list into distinct names, keeping order.
    pub fn parse_list(raw: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(slugify(name)))
            .map(str::to_string)
            .collect()
    }

    /// Create a tag.
    pub async fn create(pool: &PgPool, name: &str, slug: &str) -> Result<Self> {
        let tag = sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (id, name, slug) VALUES ($1, $2, $3) RETURNING id, name, slug",
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .bind(slug)
        .fetch_one(pool)
        .await
        .context("failed to create tag")?;

        Ok(tag)
    }

    /// Update a tag's name and slug.
    pub async fn update(pool: &PgPool, id: Uuid, name: &str, slug: &str) -> Result<Option<Self>> {
        let tag = sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = $1, slug = $2 WHERE id = $3 RETURNING id, name, slug",
        )
        .bind(name)
        .bind(slug)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to update tag")?;

        Ok(tag)
    }

    /// Delete a tag; its post associations go with it.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete tag")?;

        Ok(result.rows_affected() > 0)
    }

    /// Find a tag by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch tag by id")?;

        Ok(tag)
    }

    /// Find a tag by slug.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
            .context("failed to fetch tag by slug")?;

        Ok(tag)
    }

    /// Whether another tag already uses this name or slug.
    pub async fn conflicts(pool: &PgPool, name: &str, slug: &str, except: Option<Uuid>) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tags WHERE (name = $1 OR slug = $2) AND ($3::uuid IS NULL OR id <> $3)",
        )
        .bind(name)
        .bind(slug)
        .bind(except)
        .fetch_one(pool)
        .await
        .context("failed to check tag uniqueness")?;

        Ok(count.0 > 0)
    }

    /// All tags ordered by name.
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags ORDER BY name")
            .fetch_all(pool)
            .await
            .context("failed to list tags")?;

        Ok(tags)
    }

    /// All tags with their post counts.
    pub async fn find_all_with_counts(pool: &PgPool) -> Result<Vec<TagWithCount>> {
        let tags = sqlx::query_as::<_, TagWithCount>(
            r#"
            SELECT t.id, t.name, t.slug, COUNT(pt.post_id) AS post_count
            FROM tags t
            LEFT JOIN post_tags pt ON pt.tag_id = t.id
            GROUP BY t.id, t.name, t.slug
            ORDER BY t.name
            "#,
        )
        .fetch_all(pool)
        .await
        .context("failed to list tags with counts")?;

        Ok(tags)
    }

    /// Tags whose name starts with `prefix`, for autocompletion.
    pub async fn search(pool: &PgPool, prefix: &str, limit: i64) -> Result<Vec<Self>> {
        let pattern = format!("{}%", prefix.trim().replace(['%', '_'], ""));
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT id, name, slug FROM tags WHERE name ILIKE $1 ORDER BY name LIMIT $2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("failed to search tags")?;

        Ok(tags)
    }

    /// Tags attached to a post.
    pub async fn find_for_post(pool: &PgPool, post_id: Uuid) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name, t.slug
            FROM tags t
            JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("failed to fetch tags for post")?;

        Ok(tags)
    }

    /// Fetch the tag with this slug, creating it when missing.
    ///
    /// An existing tag with the same name wins even if its slug was edited.
    /// The upsert makes concurrent callers converge on one row.
    pub async fn ensure(conn: &mut PgConnection, name: &str, slug: &str) -> Result<Self> {
        let existing = sqlx::query_as::<_, Tag>(
            "SELECT id, name, slug FROM tags WHERE name = $1 OR slug = $2 ORDER BY (name = $1) DESC LIMIT 1",
        )
        .bind(name)
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await
        .context("failed to look up tag")?;
        if let Some(tag) = existing {
            return Ok(tag);
        }

        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (id, name, slug) VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING id, name, slug
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .bind(slug)
        .fetch_one(&mut *conn)
        .await
        .context("failed to create or reuse tag")?;

        Ok(tag)
    }

    /// Replace a post's tags with the named ones, creating missing tags.
    pub async fn set_for_post(conn: &mut PgConnection, post_id: Uuid, names: &[String]) -> Result<Vec<Self>> {
        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *conn)
            .await
            .context("failed to clear post tags")?;

        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            let Some((name, slug)) = Self::normalize(name, None) else {
                continue;
            };
            let tag = Self::ensure(conn, &name, &slug).await?;
            sqlx::query(
                "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(tag.id)
            .execute(&mut *conn)
            .await
            .context("failed to attach tag to post")?;
            tags.push(tag);
        }

        Ok(tags)
    }
}
