//! Admin dashboard and JSON helpers used by the editors.

use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Page, Post, Tag, User};
use crate::state::AppState;

use super::helpers::render_page;

/// Number of posts on the dashboard.
const RECENT_POSTS: i64 = 5;

/// Maximum tag suggestions per lookup.
const TAG_SUGGESTIONS: i64 = 20;

/// Create the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(dashboard))
        .route("/admin/api/tags", get(api_tags))
}

/// GET /admin
async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
) -> AppResult<Response> {
    let db = state.db();
    let post_count = Post::count(db).await?;
    let page_count = Page::find_all(db).await?.len();
    let tag_count = Tag::find_all(db).await?.len();
    let user_count = User::count(db).await?;
    let recent = Post::find_recent(db, RECENT_POSTS).await?;

    let now = Utc::now();
    let recent: Vec<_> = recent
        .iter()
        .map(|post| {
            serde_json::json!({
                "post": post,
                "status": post_status(post, now),
            })
        })
        .collect();

    let mut context = tera::Context::new();
    context.insert("title", "Dashboard");
    context.insert("welcome", &user.first_name);
    context.insert("post_count", &post_count);
    context.insert("page_count", &page_count);
    context.insert("tag_count", &tag_count);
    context.insert("user_count", &user_count);
    context.insert("recent_posts", &recent);
    context.insert("storage", state.media().backend());

    Ok(render_page(&state, &session, "admin/dashboard.html", context).await)
}

/// Label shown next to a post in admin lists.
pub fn post_status(post: &Post, now: chrono::DateTime<Utc>) -> &'static str {
    if !post.visible {
        "hidden"
    } else if post.is_scheduled(now) {
        "scheduled"
    } else {
        "published"
    }
}

#[derive(Debug, Deserialize)]
struct TagQuery {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct TagSuggestion {
    id: Uuid,
    name: String,
    slug: String,
}

/// GET /admin/api/tags?q= - tag names for the post editor.
async fn api_tags(
    State(state): State<AppState>,
    Query(query): Query<TagQuery>,
) -> AppResult<Json<Vec<TagSuggestion>>> {
    let tags = match query.q.as_deref().map(str::trim) {
        Some(prefix) if !prefix.is_empty() => Tag::search(state.db(), prefix, TAG_SUGGESTIONS).await?,
        _ => Tag::find_all(state.db()).await?,
    };

    Ok(Json(
        tags.into_iter()
            .map(|t| TagSuggestion {
                id: t.id,
                name: t.name,
                slug: t.slug,
            })
            .collect(),
    ))
}
