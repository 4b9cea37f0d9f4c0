//! Admin routes for post management.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::content::slug::slug_or_derive;
use crate::error::{AppError, AppResult};
use crate::form::{Flash, push_flash, require_csrf};
use crate::middleware::CurrentUser;
use crate::models::{Post, PostInput, Settings, Tag};
use crate::state::AppState;

use super::admin::post_status;
use super::helpers::{
    CsrfOnlyForm, PageQuery, Pagination, checkbox, load_settings, non_empty, page_offset,
    render_confirm_delete, render_page,
};

/// Posts per admin list page.
pub(super) const ADMIN_PAGE_SIZE: i64 = 20;

/// Create the post admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/posts", get(list_posts))
        .route("/admin/posts/new", get(new_post_form).post(create_post))
        .route("/admin/posts/{id}/edit", get(edit_post_form).post(update_post))
        .route("/admin/posts/{id}/delete", get(confirm_delete_post).post(delete_post))
}

/// Post form data.
#[derive(Debug, Default, Deserialize)]
struct PostFormData {
    #[serde(default)]
    csrf_token: String,
    title: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    visible: Option<String>,
    /// `datetime-local` value in the site timezone; blank means now.
    #[serde(default)]
    published_at: Option<String>,
    /// Comma separated tag names.
    #[serde(default)]
    tags: String,
}

impl PostFormData {
    fn from_post(post: &Post, settings: &Settings) -> Self {
        Self {
            csrf_token: String::new(),
            title: post.title.clone(),
            slug: Some(post.slug.clone()),
            content: post.content.clone(),
            excerpt: post.excerpt.clone(),
            visible: post.visible.then(|| "on".to_string()),
            published_at: Some(settings.to_local_input(post.published_at)),
            tags: post.tag_list(),
        }
    }

    fn values(&self) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "slug": self.slug,
            "content": self.content,
            "excerpt": self.excerpt,
            "visible": checkbox(self.visible.as_deref()),
            "published_at": self.published_at,
            "tags": self.tags,
        })
    }

    /// Validate into a model input, collecting every problem.
    fn to_input(&self, settings: &Settings) -> Result<PostInput, Vec<String>> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push("Title is required.".to_string());
        }

        let slug = slug_or_derive(self.slug.as_deref(), title);
        if slug.is_empty() && !title.is_empty() {
            errors.push("Slug must contain letters or digits.".to_string());
        }

        let published_at = match non_empty(self.published_at.as_deref()) {
            None => Some(Utc::now()),
            Some(raw) => settings.from_local_input(&raw),
        };
        if published_at.is_none() {
            errors.push("Publication date is invalid.".to_string());
        }

        match published_at {
            Some(published_at) if errors.is_empty() => Ok(PostInput {
                title: title.to_string(),
                slug,
                content: self.content.clone(),
                excerpt: non_empty(self.excerpt.as_deref()),
                visible: checkbox(self.visible.as_deref()),
                published_at,
                tags: Tag::parse_list(&self.tags),
            }),
            _ => Err(errors),
        }
    }
}

async fn render_form(
    state: &AppState,
    session: &Session,
    editing: Option<Uuid>,
    form: &PostFormData,
    errors: &[String],
) -> Response {
    let action = match editing {
        Some(id) => format!("/admin/posts/{id}/edit"),
        None => "/admin/posts/new".to_string(),
    };

    let mut context = tera::Context::new();
    context.insert("title", if editing.is_some() { "Edit post" } else { "New post" });
    context.insert("action", &action);
    context.insert("editing", &editing.is_some());
    context.insert("values", &form.values());
    context.insert("errors", errors);

    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let page = render_page(state, session, "admin/post_form.html", context).await;
    (status, page).into_response()
}

/// GET /admin/posts
async fn list_posts(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let page = query.number();
    let (posts, total) =
        Post::find_all(state.db(), ADMIN_PAGE_SIZE, page_offset(page, ADMIN_PAGE_SIZE)).await?;

    let now = Utc::now();
    let rows: Vec<_> = posts
        .iter()
        .map(|post| serde_json::json!({ "post": post, "status": post_status(post, now) }))
        .collect();

    let mut context = tera::Context::new();
    context.insert("title", "Posts");
    context.insert("posts", &rows);
    context.insert("pagination", &Pagination::new(page, total, ADMIN_PAGE_SIZE));

    Ok(render_page(&state, &session, "admin/posts.html", context).await)
}

/// GET /admin/posts/new
async fn new_post_form(State(state): State<AppState>, session: Session) -> Response {
    let settings = load_settings(&state).await;
    let form = PostFormData {
        visible: Some("on".to_string()),
        published_at: Some(settings.to_local_input(Utc::now())),
        ..PostFormData::default()
    };
    render_form(&state, &session, None, &form, &[]).await
}

/// POST /admin/posts/new
async fn create_post(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(form): Form<PostFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let settings = load_settings(&state).await;
    let input = match form.to_input(&settings) {
        Ok(input) => input,
        Err(errors) => return Ok(render_form(&state, &session, None, &form, &errors).await),
    };
    if Post::slug_taken(state.db(), &input.slug, None).await? {
        let errors = [format!("A post with the slug '{}' already exists.", input.slug)];
        return Ok(render_form(&state, &session, None, &form, &errors).await);
    }

    let id = Post::create(state.db(), user.id, &input).await?;
    info!(post_id = %id, slug = %input.slug, author_id = %user.id, "post created");

    push_flash(&session, Flash::success("Post created.")).await;
    Ok(Redirect::to("/admin/posts").into_response())
}

/// GET /admin/posts/{id}/edit
async fn edit_post_form(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let post = Post::find_by_id(state.db(), id).await?.ok_or(AppError::NotFound)?;
    let settings = load_settings(&state).await;
    let form = PostFormData::from_post(&post, &settings);
    Ok(render_form(&state, &session, Some(id), &form, &[]).await)
}

/// POST /admin/posts/{id}/edit
async fn update_post(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<PostFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let settings = load_settings(&state).await;
    let input = match form.to_input(&settings) {
        Ok(input) => input,
        Err(errors) => return Ok(render_form(&state, &session, Some(id), &form, &errors).await),
    };
    if Post::slug_taken(state.db(), &input.slug, Some(id)).await? {
        let errors = [format!("A post with the slug '{}' already exists.", input.slug)];
        return Ok(render_form(&state, &session, Some(id), &form, &errors).await);
    }

    if !Post::update(state.db(), id, &input).await? {
        return Err(AppError::NotFound);
    }
    info!(post_id = %id, slug = %input.slug, "post updated");

    push_flash(&session, Flash::success("Post updated.")).await;
    Ok(Redirect::to("/admin/posts").into_response())
}

/// GET /admin/posts/{id}/delete
async fn confirm_delete_post(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let post = Post::find_by_id(state.db(), id).await?.ok_or(AppError::NotFound)?;
    Ok(render_confirm_delete(
        &state,
        &session,
        &format!("post \"{}\"", post.title),
        &format!("/admin/posts/{id}/delete"),
        "/admin/posts",
    )
    .await)
}

/// POST /admin/posts/{id}/delete
async fn delete_post(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<CsrfOnlyForm>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    if !Post::delete(state.db(), id).await? {
        return Err(AppError::NotFound);
    }
    info!(post_id = %id, "post deleted");

    push_flash(&session, Flash::success("Post deleted.")).await;
    Ok(Redirect::to("/admin/posts").into_response())
}
