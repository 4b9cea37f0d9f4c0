//! Admin routes for the site menu.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::form::{Flash, push_flash, require_csrf};
use crate::menu::{Direction, MenuError};
use crate::models::{MenuItem, MenuItemInput, Page};
use crate::state::AppState;

use super::helpers::{CsrfOnlyForm, render_confirm_delete, render_page};

/// Header carrying the CSRF token for JSON requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Create the menu admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/menus", get(list_menu_items).post(save_menu))
        .route("/admin/menus/new", get(new_item_form).post(create_item))
        .route("/admin/menus/{id}/edit", get(edit_item_form).post(update_item))
        .route("/admin/menus/{id}/move/{direction}", post(move_item))
        .route("/admin/menus/{id}/delete", get(confirm_delete_item).post(delete_item))
}

/// Menu item form data.
#[derive(Debug, Default, Deserialize)]
struct MenuFormData {
    #[serde(default)]
    csrf_token: String,
    label: String,
    /// `url` or `page`; decides which of the two fields below is used.
    #[serde(default)]
    target: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    page_id: String,
}

impl MenuFormData {
    fn from_item(item: &MenuItem) -> Self {
        Self {
            csrf_token: String::new(),
            label: item.label.clone(),
            target: if item.page_id.is_some() { "page" } else { "url" }.to_string(),
            url: item.url.clone().unwrap_or_default(),
            page_id: item.page_id.map(|id| id.to_string()).unwrap_or_default(),
        }
    }

    fn to_input(&self) -> Result<MenuItemInput, MenuError> {
        let (url, page_id) = match self.target.as_str() {
            "page" => {
                let page_id = Uuid::parse_str(self.page_id.trim())
                    .map_err(|_| MenuError::Invalid("choose a page".into()))?;
                (None, Some(page_id))
            }
            _ => (Some(self.url.clone()), None),
        };
        let input = MenuItemInput {
            label: self.label.clone(),
            url,
            page_id,
        };
        input.validate()?;
        Ok(input)
    }

    fn values(&self) -> serde_json::Value {
        serde_json::json!({
            "label": self.label,
            "target": if self.target == "page" { "page" } else { "url" },
            "url": self.url,
            "page_id": self.page_id,
        })
    }
}

async fn render_form(
    state: &AppState,
    session: &Session,
    editing: Option<Uuid>,
    form: &MenuFormData,
    errors: &[String],
) -> AppResult<Response> {
    let action = match editing {
        Some(id) => format!("/admin/menus/{id}/edit"),
        None => "/admin/menus/new".to_string(),
    };
    let pages = Page::find_all(state.db()).await?;

    let mut context = tera::Context::new();
    context.insert("title", if editing.is_some() { "Edit menu item" } else { "New menu item" });
    context.insert("action", &action);
    context.insert("editing", &editing.is_some());
    context.insert("values", &form.values());
    context.insert("pages", &pages);
    context.insert("errors", errors);

    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let page = render_page(state, session, "admin/menu_form.html", context).await;
    Ok((status, page).into_response())
}

/// Messages for errors the editor can fix; anything else propagates.
fn user_error(e: MenuError) -> AppResult<String> {
    match e {
        MenuError::Invalid(_) | MenuError::AlreadyAtTop | MenuError::AlreadyAtBottom => {
            Ok(capitalize(&e.to_string()))
        }
        other => Err(other.into()),
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>() + ".",
        None => String::new(),
    }
}

/// GET /admin/menus
async fn list_menu_items(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let items = MenuItem::find_all(state.db()).await?;
    let rows: Vec<_> = items
        .iter()
        .map(|item| serde_json::json!({ "item": item, "href": item.href() }))
        .collect();

    let mut context = tera::Context::new();
    context.insert("title", "Menu");
    context.insert("items", &rows);

    Ok(render_page(&state, &session, "admin/menus.html", context).await)
}

/// GET /admin/menus/new
async fn new_item_form(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let form = MenuFormData {
        target: "url".to_string(),
        ..MenuFormData::default()
    };
    render_form(&state, &session, None, &form, &[]).await
}

/// POST /admin/menus/new - appended at the end of the menu.
async fn create_item(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<MenuFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let result = match form.to_input() {
        Ok(input) => MenuItem::create(state.db(), &input).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(id) => {
            info!(menu_item = %id, "menu item created");
            push_flash(&session, Flash::success("Menu item created.")).await;
            Ok(Redirect::to("/admin/menus").into_response())
        }
        Err(e) => {
            let errors = [user_error(e)?];
            render_form(&state, &session, None, &form, &errors).await
        }
    }
}

/// GET /admin/menus/{id}/edit
async fn edit_item_form(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let item = MenuItem::find_by_id(state.db(), id)
        .await?
        .ok_or(AppError::NotFound)?;
    render_form(&state, &session, Some(id), &MenuFormData::from_item(&item), &[]).await
}

/// POST /admin/menus/{id}/edit
async fn update_item(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<MenuFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let result = match form.to_input() {
        Ok(input) => MenuItem::update(state.db(), id, &input).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            info!(menu_item = %id, "menu item updated");
            push_flash(&session, Flash::success("Menu item updated.")).await;
            Ok(Redirect::to("/admin/menus").into_response())
        }
        Err(e) => {
            let errors = [user_error(e)?];
            render_form(&state, &session, Some(id), &form, &errors).await
        }
    }
}

/// POST /admin/menus/{id}/move/{direction}
async fn move_item(
    State(state): State<AppState>,
    session: Session,
    Path((id, direction)): Path<(Uuid, String)>,
    Form(form): Form<CsrfOnlyForm>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let result = match direction.parse::<Direction>() {
        Ok(direction) => MenuItem::move_item(state.db(), id, direction).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        push_flash(&session, Flash::error(user_error(e)?)).await;
    }
    Ok(Redirect::to("/admin/menus").into_response())
}

/// GET /admin/menus/{id}/delete
async fn confirm_delete_item(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let item = MenuItem::find_by_id(state.db(), id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(render_confirm_delete(
        &state,
        &session,
        &format!("menu item \"{}\"", item.label),
        &format!("/admin/menus/{id}/delete"),
        "/admin/menus",
    )
    .await)
}

/// POST /admin/menus/{id}/delete - later items move up one place.
async fn delete_item(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<CsrfOnlyForm>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    MenuItem::delete(state.db(), id).await?;
    info!(menu_item = %id, "menu item deleted");

    push_flash(&session, Flash::success("Menu item deleted.")).await;
    Ok(Redirect::to("/admin/menus").into_response())
}

#[derive(Debug, Serialize)]
struct SaveMenuResponse {
    saved: usize,
}

/// POST /admin/menus - replace the whole menu with a JSON list, in order.
async fn save_menu(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Json(entries): Json<Vec<MenuItemInput>>,
) -> AppResult<Json<SaveMenuResponse>> {
    let token = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    require_csrf(&session, token).await?;

    MenuItem::replace_all(state.db(), &entries).await?;
    info!(count = entries.len(), "menu saved");

    Ok(Json(SaveMenuResponse {
        saved: entries.len(),
    }))
}
