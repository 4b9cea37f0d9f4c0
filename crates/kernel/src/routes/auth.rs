//! Authentication routes (login, logout, first-run setup).

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::form::{Flash, push_flash, verify_csrf_token};
use crate::middleware::auth::{safe_next, session_user};
use crate::models::{CreateUser, User};
use crate::session::{SESSION_USER_ID, login_expiry};
use crate::state::AppState;
use crate::validation::validate_account;

use super::helpers::render_page;

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", get(logout))
        .route("/setup", get(setup_form).post(setup_submit))
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Login form submission.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub csrf_token: String,
}

/// First administrator account.
#[derive(Debug, Deserialize)]
pub struct SetupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Internal(anyhow::anyhow!("session error: {e}"))
}

async fn render_login(
    state: &AppState,
    session: &Session,
    status: StatusCode,
    email: &str,
    next: Option<&str>,
    error: Option<&str>,
) -> Response {
    let mut context = tera::Context::new();
    context.insert("title", "Log in");
    context.insert("email", email);
    context.insert("next", &next);
    context.insert("error", &error);
    let page = render_page(state, session, "user/login.html", context).await;
    (status, page).into_response()
}

/// GET /login
async fn login_form(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<NextQuery>,
) -> AppResult<Response> {
    if User::count(state.db()).await? == 0 {
        return Ok(Redirect::to("/setup").into_response());
    }
    if session_user(&state, &session).await.is_some() {
        return Ok(Redirect::to(safe_next(query.next.as_deref())).into_response());
    }

    Ok(render_login(&state, &session, StatusCode::OK, "", query.next.as_deref(), None).await)
}

/// POST /login
async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let next = form.next.as_deref();

    if !verify_csrf_token(&session, &form.csrf_token).await? {
        return Ok(render_login(
            &state,
            &session,
            StatusCode::BAD_REQUEST,
            &form.email,
            next,
            Some("Your form expired. Please try again."),
        )
        .await);
    }

    let user = User::find_by_email(state.db(), form.email.trim()).await?;
    let Some(user) = user.filter(|u| u.verify_password(&form.password)) else {
        info!(email = %form.email.trim(), "failed login attempt");
        return Ok(render_login(
            &state,
            &session,
            StatusCode::UNAUTHORIZED,
            &form.email,
            next,
            Some("Invalid email or password"),
        )
        .await);
    };

    // Session fixation.
    session.cycle_id().await.map_err(session_error)?;
    session
        .insert(SESSION_USER_ID, user.id)
        .await
        .map_err(session_error)?;
    session.set_expiry(Some(login_expiry()));

    info!(user_id = %user.id, "user logged in");
    Ok(Redirect::to(safe_next(next)).into_response())
}

/// GET /logout
async fn logout(session: Session) -> AppResult<Response> {
    if let Ok(Some(user_id)) = session.get::<uuid::Uuid>(SESSION_USER_ID).await {
        info!(%user_id, "user logged out");
    }
    session.flush().await.map_err(session_error)?;
    Ok(Redirect::to("/login").into_response())
}

async fn render_setup(
    state: &AppState,
    session: &Session,
    status: StatusCode,
    form: Option<&SetupForm>,
    errors: &[String],
) -> Response {
    let mut context = tera::Context::new();
    context.insert("title", "Set up your blog");
    context.insert("first_name", form.map_or("", |f| f.first_name.as_str()));
    context.insert("last_name", form.map_or("", |f| f.last_name.as_str()));
    context.insert("email", form.map_or("", |f| f.email.as_str()));
    context.insert("errors", errors);
    let page = render_page(state, session, "user/setup.html", context).await;
    (status, page).into_response()
}

/// GET /setup - only while no user exists.
async fn setup_form(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    if User::count(state.db()).await? > 0 {
        return Ok(Redirect::to("/login?next=%2Fadmin").into_response());
    }
    Ok(render_setup(&state, &session, StatusCode::OK, None, &[]).await)
}

/// POST /setup - create the first administrator.
async fn setup_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SetupForm>,
) -> AppResult<Response> {
    if User::count(state.db()).await? > 0 {
        return Ok(Redirect::to("/login?next=%2Fadmin").into_response());
    }

    if !verify_csrf_token(&session, &form.csrf_token).await? {
        let errors = ["Your form expired. Please try again.".to_string()];
        return Ok(render_setup(&state, &session, StatusCode::BAD_REQUEST, Some(&form), &errors).await);
    }

    let errors: Vec<String> = validate_account(
        &form.first_name,
        &form.last_name,
        &form.email,
        Some(&form.password),
    )
    .into_iter()
    .map(|e| e.message)
    .collect();
    if !errors.is_empty() {
        return Ok(render_setup(&state, &session, StatusCode::BAD_REQUEST, Some(&form), &errors).await);
    }

    let user = User::create(
        state.db(),
        CreateUser {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            email: form.email.trim().to_string(),
            password: form.password,
        },
    )
    .await?;

    info!(user_id = %user.id, "initial administrator created");
    push_flash(&session, Flash::success("Account created. You can now log in.")).await;
    Ok(Redirect::to("/login?next=%2Fadmin").into_response())
}
