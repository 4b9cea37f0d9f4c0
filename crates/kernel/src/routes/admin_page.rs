//! Admin routes for static pages.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::content::slug::slug_or_derive;
use crate::error::{AppError, AppResult};
use crate::form::{Flash, push_flash, require_csrf};
use crate::models::{ContentType, MenuItem, Page, PageInput};
use crate::state::AppState;

use super::helpers::{CsrfOnlyForm, checkbox, render_confirm_delete, render_page};

/// Create the page admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/pages", get(list_pages))
        .route("/admin/pages/new", get(new_page_form).post(create_page))
        .route("/admin/pages/{id}/edit", get(edit_page_form).post(update_page))
        .route("/admin/pages/{id}/delete", get(confirm_delete_page).post(delete_page))
}

/// Page form data.
#[derive(Debug, Default, Deserialize)]
struct PageFormData {
    #[serde(default)]
    csrf_token: String,
    title: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    visible: Option<String>,
}

impl PageFormData {
    fn from_page(page: &Page) -> Self {
        Self {
            csrf_token: String::new(),
            title: page.title.clone(),
            slug: Some(page.slug.clone()),
            content: page.content.clone(),
            content_type: page.content_type.clone(),
            visible: page.visible.then(|| "on".to_string()),
        }
    }

    fn values(&self) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "slug": self.slug,
            "content": self.content,
            "content_type": ContentType::parse(&self.content_type).as_str(),
            "visible": checkbox(self.visible.as_deref()),
        })
    }

    fn to_input(&self) -> Result<PageInput, Vec<String>> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(vec!["Title is required.".to_string()]);
        }
        let slug = slug_or_derive(self.slug.as_deref(), title);
        if slug.is_empty() {
            return Err(vec!["Slug must contain letters or digits.".to_string()]);
        }

        Ok(PageInput {
            title: title.to_string(),
            slug,
            content: self.content.clone(),
            content_type: ContentType::parse(&self.content_type),
            visible: checkbox(self.visible.as_deref()),
        })
    }
}

async fn render_form(
    state: &AppState,
    session: &Session,
    editing: Option<Uuid>,
    form: &PageFormData,
    errors: &[String],
) -> Response {
    let action = match editing {
        Some(id) => format!("/admin/pages/{id}/edit"),
        None => "/admin/pages/new".to_string(),
    };

    let mut context = tera::Context::new();
    context.insert("title", if editing.is_some() { "Edit page" } else { "New page" });
    context.insert("action", &action);
    context.insert("editing", &editing.is_some());
    context.insert("values", &form.values());
    context.insert("errors", errors);

    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let page = render_page(state, session, "admin/page_form.html", context).await;
    (status, page).into_response()
}

/// GET /admin/pages
async fn list_pages(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let pages = Page::find_all(state.db()).await?;

    let mut context = tera::Context::new();
    context.insert("title", "Pages");
    context.insert("pages", &pages);

    Ok(render_page(&state, &session, "admin/pages.html", context).await)
}

/// GET /admin/pages/new
async fn new_page_form(State(state): State<AppState>, session: Session) -> Response {
    let form = PageFormData {
        content_type: ContentType::Markdown.as_str().to_string(),
        visible: Some("on".to_string()),
        ..PageFormData::default()
    };
    render_form(&state, &session, None, &form, &[]).await
}

/// POST /admin/pages/new
async fn create_page(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PageFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => return Ok(render_form(&state, &session, None, &form, &errors).await),
    };
    if Page::slug_taken(state.db(), &input.slug, None).await? {
        let errors = [format!("A page with the slug '{}' already exists.", input.slug)];
        return Ok(render_form(&state, &session, None, &form, &errors).await);
    }

    let page = Page::create(state.db(), &input).await?;
    info!(page_id = %page.id, slug = %page.slug, "page created");

    push_flash(&session, Flash::success("Page created.")).await;
    Ok(Redirect::to("/admin/pages").into_response())
}

/// GET /admin/pages/{id}/edit
async fn edit_page_form(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let page = Page::find_by_id(state.db(), id).await?.ok_or(AppError::NotFound)?;
    Ok(render_form(&state, &session, Some(id), &PageFormData::from_page(&page), &[]).await)
}

/// POST /admin/pages/{id}/edit
async fn update_page(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<PageFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => return Ok(render_form(&state, &session, Some(id), &form, &errors).await),
    };
    if Page::slug_taken(state.db(), &input.slug, Some(id)).await? {
        let errors = [format!("A page with the slug '{}' already exists.", input.slug)];
        return Ok(render_form(&state, &session, Some(id), &form, &errors).await);
    }

    let page = Page::update(state.db(), id, &input)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(page_id = %page.id, slug = %page.slug, "page updated");

    push_flash(&session, Flash::success("Page updated.")).await;
    Ok(Redirect::to("/admin/pages").into_response())
}

/// GET /admin/pages/{id}/delete
async fn confirm_delete_page(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let page = Page::find_by_id(state.db(), id).await?.ok_or(AppError::NotFound)?;
    Ok(render_confirm_delete(
        &state,
        &session,
        &format!("page \"{}\"", page.title),
        &format!("/admin/pages/{id}/delete"),
        "/admin/pages",
    )
    .await)
}

/// POST /admin/pages/{id}/delete - refused while menu items link to the page.
async fn delete_page(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<CsrfOnlyForm>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    if MenuItem::count_for_page(state.db(), id).await? > 0 {
        push_flash(
            &session,
            Flash::error("This page is linked from the menu. Remove those menu items first."),
        )
        .await;
        return Ok(Redirect::to("/admin/pages").into_response());
    }

    if !Page::delete(state.db(), id).await? {
        return Err(AppError::NotFound);
    }
    info!(page_id = %id, "page deleted");

    push_flash(&session, Flash::success("Page deleted.")).await;
    Ok(Redirect::to("/admin/pages").into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_content_type_is_markdown() {
        let form = PageFormData {
            title: "About".to_string(),
            content_type: "rtf".to_string(),
            ..PageFormData::default()
        };
        let input = form.to_input().unwrap();
        assert_eq!(input.content_type, ContentType::Markdown);
        assert_eq!(input.slug, "about");
        assert!(!input.visible);
    }

    #[test]
    fn explicit_slug_is_normalized() {
        let form = PageFormData {
            title: "About".to_string(),
            slug: Some(" Who We Are ".to_string()),
            content_type: "html".to_string(),
            ..PageFormData::default()
        };
        let input = form.to_input().unwrap();
        assert_eq!(input.slug, "who-we-are");
        assert_eq!(input.content_type, ContentType::Html);
    }

    #[test]
    fn title_required() {
        assert!(PageFormData::default().to_input().is_err());
    }
}
