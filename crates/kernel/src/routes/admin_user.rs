//! Admin routes for user accounts.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::form::{Flash, push_flash, require_csrf};
use crate::middleware::CurrentUser;
use crate::models::{CreateUser, Post, UpdateUser, User};
use crate::state::AppState;
use crate::validation::validate_account;

use super::helpers::{CsrfOnlyForm, non_empty, render_confirm_delete, render_page};

/// Create the user admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/new", get(new_user_form).post(create_user))
        .route("/admin/users/{id}/edit", get(edit_user_form).post(update_user))
        .route("/admin/users/{id}/delete", get(confirm_delete_user).post(delete_user))
}

/// User form data.
#[derive(Debug, Default, Deserialize)]
struct UserFormData {
    #[serde(default)]
    csrf_token: String,
    first_name: String,
    last_name: String,
    email: String,
    /// Required for new users; blank keeps the current one on edit.
    #[serde(default)]
    password: String,
}

impl UserFormData {
    fn values(&self) -> serde_json::Value {
        serde_json::json!({
            "first_name": self.first_name,
            "last_name": self.last_name,
            "email": self.email,
        })
    }

    /// Field errors; the password is only checked when one is required or
    /// supplied.
    fn errors(&self, password_required: bool) -> Vec<String> {
        let password = non_empty(Some(&self.password));
        let password = match (password_required, password.as_deref()) {
            (true, None) => Some(""),
            (_, p) => p,
        };
        validate_account(&self.first_name, &self.last_name, &self.email, password)
            .into_iter()
            .map(|e| e.message)
            .collect()
    }
}

async fn render_form(
    state: &AppState,
    session: &Session,
    editing: Option<Uuid>,
    form: &UserFormData,
    errors: &[String],
) -> Response {
    let action = match editing {
        Some(id) => format!("/admin/users/{id}/edit"),
        None => "/admin/users/new".to_string(),
    };

    let mut context = tera::Context::new();
    context.insert("title", if editing.is_some() { "Edit user" } else { "New user" });
    context.insert("action", &action);
    context.insert("editing", &editing.is_some());
    context.insert("values", &form.values());
    context.insert("errors", errors);

    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let page = render_page(state, session, "admin/user_form.html", context).await;
    (status, page).into_response()
}

/// GET /admin/users
async fn list_users(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let users = User::find_all(state.db()).await?;

    let mut context = tera::Context::new();
    context.insert("title", "Users");
    context.insert("users", &users);

    Ok(render_page(&state, &session, "admin/users.html", context).await)
}

/// GET /admin/users/new
async fn new_user_form(State(state): State<AppState>, session: Session) -> Response {
    render_form(&state, &session, None, &UserFormData::default(), &[]).await
}

/// POST /admin/users/new
async fn create_user(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UserFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let mut errors = form.errors(true);
    if errors.is_empty() && User::count_by_email(state.db(), &form.email, None).await? > 0 {
        errors.push("A user with this email already exists.".to_string());
    }
    if !errors.is_empty() {
        return Ok(render_form(&state, &session, None, &form, &errors).await);
    }

    let user = User::create(
        state.db(),
        CreateUser {
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            email: form.email.clone(),
            password: form.password.clone(),
        },
    )
    .await?;
    info!(user_id = %user.id, "user created");

    push_flash(&session, Flash::success("User created.")).await;
    Ok(Redirect::to("/admin/users").into_response())
}

/// GET /admin/users/{id}/edit
async fn edit_user_form(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let user = User::find_by_id(state.db(), id).await?.ok_or(AppError::NotFound)?;
    let form = UserFormData {
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        ..UserFormData::default()
    };
    Ok(render_form(&state, &session, Some(id), &form, &[]).await)
}

/// POST /admin/users/{id}/edit
async fn update_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<UserFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let mut errors = form.errors(false);
    if errors.is_empty() && User::count_by_email(state.db(), &form.email, Some(id)).await? > 0 {
        errors.push("A user with this email already exists.".to_string());
    }
    if !errors.is_empty() {
        return Ok(render_form(&state, &session, Some(id), &form, &errors).await);
    }

    let user = User::update(
        state.db(),
        id,
        UpdateUser {
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            email: form.email.clone(),
            password: non_empty(Some(&form.password)),
        },
    )
    .await?
    .ok_or(AppError::NotFound)?;
    info!(user_id = %user.id, "user updated");

    push_flash(&session, Flash::success("User updated.")).await;
    Ok(Redirect::to("/admin/users").into_response())
}

/// Why a user may not be deleted, if anything stops it.
async fn delete_blocker(state: &AppState, current: &User, id: Uuid) -> AppResult<Option<&'static str>> {
    if current.id == id {
        return Ok(Some("You cannot delete your own account."));
    }
    if Post::count_by_author(state.db(), id).await? > 0 {
        return Ok(Some("This user has written posts. Delete or reassign them first."));
    }
    Ok(None)
}

/// GET /admin/users/{id}/delete
async fn confirm_delete_user(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(current): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let user = User::find_by_id(state.db(), id).await?.ok_or(AppError::NotFound)?;
    if let Some(reason) = delete_blocker(&state, &current, id).await? {
        push_flash(&session, Flash::error(reason)).await;
        return Ok(Redirect::to("/admin/users").into_response());
    }

    Ok(render_confirm_delete(
        &state,
        &session,
        &format!("user \"{}\"", user.full_name()),
        &format!("/admin/users/{id}/delete"),
        "/admin/users",
    )
    .await)
}

/// POST /admin/users/{id}/delete
async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(current): CurrentUser,
    Path(id): Path<Uuid>,
    Form(form): Form<CsrfOnlyForm>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    if let Some(reason) = delete_blocker(&state, &current, id).await? {
        push_flash(&session, Flash::error(reason)).await;
        return Ok(Redirect::to("/admin/users").into_response());
    }

    if !User::delete(state.db(), id).await? {
        return Err(AppError::NotFound);
    }
    info!(user_id = %id, deleted_by = %current.id, "user deleted");

    push_flash(&session, Flash::success("User deleted.")).await;
    Ok(Redirect::to("/admin/users").into_response())
}
