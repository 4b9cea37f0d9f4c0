//! Blog post model.
//!
//! Rendered HTML and excerpts are computed on read and never stored.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::tag::Tag;
use crate::content::{derive_excerpt, render_markdown};

const SELECT: &str = r#"
    SELECT p.id, p.title, p.slug, p.content, p.excerpt, p.visible, p.published_at,
           p.author_id, u.first_name || ' ' || u.last_name AS author_name,
           p.created_at, p.updated_at
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

/// Post record with its author's name and tags.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub visible: bool,
    pub published_at: DateTime<Utc>,
    pub author_id: Uuid,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub tags: Vec<Tag>,
}

/// Input for creating or updating a post. The slug is already normalized.
#[derive(Debug, Clone)]
pub struct PostInput {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub visible: bool,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl Post {
    /// Whether the post is visible to the public at `now`.
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.visible && self.published_at <= now
    }

    /// Visible but waiting for its publication date.
    pub fn is_scheduled(&self, now: DateTime<Utc>) -> bool {
        self.visible && self.published_at > now
    }

    /// Rendered body.
    pub fn render(&self) -> String {
        render_markdown(&self.content)
    }

    /// Rendered excerpt, explicit or derived from the content.
    pub fn render_excerpt(&self, budget: usize) -> String {
        derive_excerpt(self.excerpt.as_deref(), &self.content, budget)
    }

    /// Comma separated tag names, for edit forms.
    pub fn tag_list(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Create a post and attach its tags in one transaction.
    pub async fn create(pool: &PgPool, author_id: Uuid, input: &PostInput) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, title, slug, content, excerpt, visible, published_at, author_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.content)
        .bind(input.excerpt.as_deref())
        .bind(input.visible)
        .bind(input.published_at)
        .bind(author_id)
        .execute(&mut *tx)
        .await
        .context("failed to create post")?;

        Tag::set_for_post(&mut tx, id, &input.tags).await?;
        tx.commit().await.context("failed to commit post")?;

        Ok(id)
    }

    /// Update a post and replace its tags in one transaction.
    pub async fn update(pool: &PgPool, id: Uuid, input: &PostInput) -> Result<bool> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = $1, slug = $2, content = $3, excerpt = $4, visible = $5,
                published_at = $6, updated_at = now()
            WHERE id = $7
            "#,
        )
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.content)
        .bind(input.excerpt.as_deref())
        .bind(input.visible)
        .bind(input.published_at)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to update post")?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        Tag::set_for_post(&mut tx, id, &input.tags).await?;
        tx.commit().await.context("failed to commit post")?;

        Ok(true)
    }

    /// Delete a post; its tag links go with it.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete post")?;

        Ok(result.rows_affected() > 0)
    }

    /// Find a post by ID, with tags.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let post = sqlx::query_as::<_, Post>(&format!("{SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch post by id")?;

        with_tags(pool, post).await
    }

    /// Find a post by slug, with tags.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let post = sqlx::query_as::<_, Post>(&format!("{SELECT} WHERE p.slug = $1"))
            .bind(slug)
            .fetch_optional(pool)
            .await
            .context("failed to fetch post by slug")?;

        with_tags(pool, post).await
    }

    /// Published posts, newest first, and the total count.
    pub async fn find_published(
        pool: &PgPool,
        now: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64)> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM posts WHERE visible AND published_at <= $1",
        )
        .bind(now)
        .fetch_one(pool)
        .await
        .context("failed to count published posts")?;

        let posts = sqlx::query_as::<_, Post>(&format!(
            "{SELECT} WHERE p.visible AND p.published_at <= $1 ORDER BY p.published_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(now)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("failed to list published posts")?;

        Ok((attach_tags(pool, posts).await?, total.0))
    }

    /// Published posts carrying a tag, newest first, and the total count.
    pub async fn find_published_by_tag(
        pool: &PgPool,
        tag_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64)> {
        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM posts p
            JOIN post_tags pt ON pt.post_id = p.id
            WHERE pt.tag_id = $1 AND p.visible AND p.published_at <= $2
            "#,
        )
        .bind(tag_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .context("failed to count posts by tag")?;

        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"{SELECT}
            JOIN post_tags pt ON pt.post_id = p.id
            WHERE pt.tag_id = $1 AND p.visible AND p.published_at <= $2
            ORDER BY p.published_at DESC LIMIT $3 OFFSET $4"#
        ))
        .bind(tag_id)
        .bind(now)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("failed to list posts by tag")?;

        Ok((attach_tags(pool, posts).await?, total.0))
    }

    /// All posts for the admin list, newest first, and the total count.
    pub async fn find_all(pool: &PgPool, limit: i64, offset: i64) -> Result<(Vec<Self>, i64)> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(pool)
            .await
            .context("failed to count posts")?;

        let posts = sqlx::query_as::<_, Post>(&format!(
            "{SELECT} ORDER BY p.published_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("failed to list posts")?;

        Ok((attach_tags(pool, posts).await?, total.0))
    }

    /// Posts carrying a tag whatever their status, newest first, and the
    /// total count.
    pub async fn find_all_by_tag(
        pool: &PgPool,
        tag_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64)> {
        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM post_tags WHERE tag_id = $1")
                .bind(tag_id)
                .fetch_one(pool)
                .await
                .context("failed to count tagged posts")?;

        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"{SELECT}
            JOIN post_tags pt ON pt.post_id = p.id
            WHERE pt.tag_id = $1
            ORDER BY p.published_at DESC LIMIT $2 OFFSET $3"#
        ))
        .bind(tag_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("failed to list tagged posts")?;

        Ok((attach_tags(pool, posts).await?, total.0))
    }

    /// Most recently created posts, for the dashboard.
    pub async fn find_recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "{SELECT} ORDER BY p.created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("failed to list recent posts")?;

        Ok(posts)
    }

    /// Number of posts, published or not.
    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(pool)
            .await
            .context("failed to count posts")?;

        Ok(count.0)
    }

    /// Number of posts written by a user.
    pub async fn count_by_author(pool: &PgPool, author_id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(pool)
            .await
            .context("failed to count posts by author")?;

        Ok(count.0)
    }

    /// Whether another post already uses this slug.
    pub async fn slug_taken(pool: &PgPool, slug: &str, except: Option<Uuid>) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM posts WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(slug)
        .bind(except)
        .fetch_one(pool)
        .await
        .context("failed to check post slug")?;

        Ok(count.0 > 0)
    }
}

async fn with_tags(pool: &PgPool, post: Option<Post>) -> Result<Option<Post>> {
    let Some(mut post) = post else {
        return Ok(None);
    };
    post.tags = Tag::find_for_post(pool, post.id).await?;
    Ok(Some(post))
}

#[derive(sqlx::FromRow)]
struct PostTagRow {
    post_id: Uuid,
    id: Uuid,
    name: String,
    slug: String,
}

/// Load the tags of many posts with a single query.
async fn attach_tags(pool: &PgPool, mut posts: Vec<Post>) -> Result<Vec<Post>> {
    if posts.is_empty() {
        return Ok(posts);
    }

    let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
    let rows = sqlx::query_as::<_, PostTagRow>(
        r#"
        SELECT pt.post_id, t.id, t.name, t.slug
        FROM post_tags pt
        JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id = ANY($1)
        ORDER BY t.name
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .context("failed to load post tags")?;

    let mut by_post: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for row in rows {
        by_post.entry(row.post_id).or_default().push(Tag {
            id: row.id,
            name: row.name,
            slug: row.slug,
        });
    }
    for post in &mut posts {
        post.tags = by_post.remove(&post.id).unwrap_or_default();
    }

    Ok(posts)
}
