//! Public pages: post listing, single posts, static pages and tag archives.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Response,
    routing::get,
};
use chrono::Utc;
use serde::Serialize;
use tower_sessions::Session;

use crate::content::DEFAULT_EXCERPT_CHARS;
use crate::error::AppResult;
use crate::models::{Page, Post, Tag};
use crate::state::AppState;

use super::helpers::{PageQuery, Pagination, load_settings, not_found, page_offset, render_page};

/// Create the public router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/posts/{slug}", get(show_post))
        .route("/pages/{slug}", get(show_page))
        .route("/tags/{slug}", get(tag_archive))
}

/// A post with its rendered HTML.
#[derive(Debug, Serialize)]
struct PostView<'a> {
    #[serde(flatten)]
    post: &'a Post,
    html: String,
}

fn summaries(posts: &[Post]) -> Vec<PostView<'_>> {
    posts
        .iter()
        .map(|post| PostView {
            post,
            html: post.render_excerpt(DEFAULT_EXCERPT_CHARS),
        })
        .collect()
}

/// GET / - latest published posts.
async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let per_page = load_settings(&state).await.page_size();
    let page = query.number();

    let (posts, total) = Post::find_published(
        state.db(),
        Utc::now(),
        per_page,
        page_offset(page, per_page),
    )
    .await?;

    let mut context = tera::Context::new();
    context.insert("title", "Latest articles");
    context.insert("posts", &summaries(&posts));
    context.insert("pagination", &Pagination::new(page, total, per_page));

    Ok(render_page(&state, &session, "index.html", context).await)
}

/// GET /posts/{slug} - hidden and scheduled posts are not found.
async fn show_post(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    let post = match Post::find_by_slug(state.db(), &slug).await? {
        Some(post) if post.is_published(Utc::now()) => post,
        _ => return Ok(not_found(&state, &session).await),
    };

    let mut context = tera::Context::new();
    context.insert("title", &post.title);
    context.insert(
        "post",
        &PostView {
            post: &post,
            html: post.render(),
        },
    );

    Ok(render_page(&state, &session, "post.html", context).await)
}

/// GET /pages/{slug}
async fn show_page(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    let page = match Page::find_by_slug(state.db(), &slug).await? {
        Some(page) if page.visible => page,
        _ => return Ok(not_found(&state, &session).await),
    };

    let mut context = tera::Context::new();
    context.insert("title", &page.title);
    context.insert("page", &page);
    context.insert("html", &page.render());

    Ok(render_page(&state, &session, "page.html", context).await)
}

/// GET /tags/{slug} - published posts carrying a tag.
async fn tag_archive(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let Some(tag) = Tag::find_by_slug(state.db(), &slug).await? else {
        return Ok(not_found(&state, &session).await);
    };

    let per_page = load_settings(&state).await.page_size();
    let page = query.number();
    let (posts, total) = Post::find_published_by_tag(
        state.db(),
        tag.id,
        Utc::now(),
        per_page,
        page_offset(page, per_page),
    )
    .await?;

    let mut context = tera::Context::new();
    context.insert("title", &format!("Posts tagged {}", tag.name));
    context.insert("tag", &tag);
    context.insert("posts", &summaries(&posts));
    context.insert("pagination", &Pagination::new(page, total, per_page));

    Ok(render_page(&state, &session, "tag.html", context).await)
}
