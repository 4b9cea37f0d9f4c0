//! Admin routes for tag management.

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

use crate::error::{AppError, AppResult};
use crate::form::{Flash, push_flash, require_csrf};
use crate::models::{Post, Tag};
use crate::state::AppState;

use super::admin::post_status;
use super::admin_post::ADMIN_PAGE_SIZE;
use super::helpers::{
    CsrfOnlyForm, PageQuery, Pagination, page_offset, render_confirm_delete, render_page,
};

/// Create the tag admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/tags", get(list_tags))
        .route("/admin/tags/new", get(new_tag_form).post(create_tag))
        .route("/admin/tags/{id}/posts", get(list_tag_posts))
        .route("/admin/tags/{id}/edit", get(edit_tag_form).post(update_tag))
        .route("/admin/tags/{id}/delete", get(confirm_delete_tag).post(delete_tag))
}

/// Tag form data.
#[derive(Debug, Default, Deserialize)]
struct TagFormData {
    #[serde(default)]
    csrf_token: String,
    name: String,
    #[serde(default)]
    slug: Option<String>,
}

async fn render_form(
    state: &AppState,
    session: &Session,
    editing: Option<Uuid>,
    form: &TagFormData,
    errors: &[String],
) -> Response {
    let action = match editing {
        Some(id) => format!("/admin/tags/{id}/edit"),
        None => "/admin/tags/new".to_string(),
    };

    let mut context = tera::Context::new();
    context.insert("title", if editing.is_some() { "Edit tag" } else { "New tag" });
    context.insert("action", &action);
    context.insert("editing", &editing.is_some());
    context.insert(
        "values",
        &serde_json::json!({ "name": form.name, "slug": form.slug }),
    );
    context.insert("errors", errors);

    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let page = render_page(state, session, "admin/tag_form.html", context).await;
    (status, page).into_response()
}

/// Normalize the form and check uniqueness.
async fn validate(
    state: &AppState,
    form: &TagFormData,
    except: Option<Uuid>,
) -> AppResult<Result<(String, String), Vec<String>>> {
    let Some((name, slug)) = Tag::normalize(&form.name, form.slug.as_deref()) else {
        return Ok(Err(vec!["Name is required and must contain letters or digits.".to_string()]));
    };
    if Tag::conflicts(state.db(), &name, &slug, except).await? {
        return Ok(Err(vec![format!(
            "A tag named '{name}' or with the slug '{slug}' already exists."
        )]));
    }
    Ok(Ok((name, slug)))
}

/// GET /admin/tags
async fn list_tags(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let tags = Tag::find_all_with_counts(state.db()).await?;

    let mut context = tera::Context::new();
    context.insert("title", "Tags");
    context.insert("tags", &tags);

    Ok(render_page(&state, &session, "admin/tags.html", context).await)
}

/// GET /admin/tags/{id}/posts - every post with the tag, drafts included.
async fn list_tag_posts(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let tag = Tag::find_by_id(state.db(), id).await?.ok_or(AppError::NotFound)?;

    let page = query.number();
    let (posts, total) = Post::find_all_by_tag(
        state.db(),
        tag.id,
        ADMIN_PAGE_SIZE,
        page_offset(page, ADMIN_PAGE_SIZE),
    )
    .await?;

    let now = Utc::now();
    let rows: Vec<_> = posts
        .iter()
        .map(|post| serde_json::json!({ "post": post, "status": post_status(post, now) }))
        .collect();

    let mut context = tera::Context::new();
    context.insert("title", &format!("Posts tagged {}", tag.name));
    context.insert("tag", &tag);
    context.insert("posts", &rows);
    context.insert("pagination", &Pagination::new(page, total, ADMIN_PAGE_SIZE));

    Ok(render_page(&state, &session, "admin/posts.html", context).await)
}

/// GET /admin/tags/new
async fn new_tag_form(State(state): State<AppState>, session: Session) -> Response {
    render_form(&state, &session, None, &TagFormData::default(), &[]).await
}

/// POST /admin/tags/new
async fn create_tag(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<TagFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let (name, slug) = match validate(&state, &form, None).await? {
        Ok(values) => values,
        Err(errors) => return Ok(render_form(&state, &session, None, &form, &errors).await),
    };

    let tag = Tag::create(state.db(), &name, &slug).await?;
    info!(tag_id = %tag.id, slug = %tag.slug, "tag created");

    push_flash(&session, Flash::success("Tag created.")).await;
    Ok(Redirect::to("/admin/tags").into_response())
}

/// GET /admin/tags/{id}/edit
async fn edit_tag_form(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let tag = Tag::find_by_id(state.db(), id).await?.ok_or(AppError::NotFound)?;
    let form = TagFormData {
        csrf_token: String::new(),
        name: tag.name,
        slug: Some(tag.slug),
    };
    Ok(render_form(&state, &session, Some(id), &form, &[]).await)
}

/// POST /admin/tags/{id}/edit
async fn update_tag(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<TagFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let (name, slug) = match validate(&state, &form, Some(id)).await? {
        Ok(values) => values,
        Err(errors) => return Ok(render_form(&state, &session, Some(id), &form, &errors).await),
    };

    let tag = Tag::update(state.db(), id, &name, &slug)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(tag_id = %tag.id, slug = %tag.slug, "tag updated");

    push_flash(&session, Flash::success("Tag updated.")).await;
    Ok(Redirect::to("/admin/tags").into_response())
}

/// GET /admin/tags/{id}/delete
async fn confirm_delete_tag(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let tag = Tag::find_by_id(state.db(), id).await?.ok_or(AppError::NotFound)?;
    Ok(render_confirm_delete(
        &state,
        &session,
        &format!("tag \"{}\"", tag.name),
        &format!("/admin/tags/{id}/delete"),
        "/admin/tags",
    )
    .await)
}

/// POST /admin/tags/{id}/delete - posts keep existing without the tag.
async fn delete_tag(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<CsrfOnlyForm>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    if !Tag::delete(state.db(), id).await? {
        return Err(AppError::NotFound);
    }
    info!(tag_id = %id, "tag deleted");

    push_flash(&session, Flash::success("Tag deleted.")).await;
    Ok(Redirect::to("/admin/tags").into_response())
}
