//! Shared route helpers for page rendering.

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

use crate::form::{generate_csrf_token, take_flashes};
use crate::middleware::session_user;
use crate::models::{Media, MenuItem, Settings};
use crate::state::AppState;

/// A rendered navigation link.
#[derive(Debug, Clone, Serialize)]
pub struct MenuLink {
    pub label: String,
    pub href: String,
}

/// Load the site settings, falling back to defaults on failure.
pub async fn load_settings(state: &AppState) -> Settings {
    match Settings::get(state.db()).await {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "failed to load settings");
            Settings::default()
        }
    }
}

/// Inject site-wide context variables into a Tera context.
///
/// Adds: `site`, `site_logo`, `menu`, `current_user`, `flashes`, `csrf_token`
pub async fn inject_site_context(state: &AppState, session: &Session, context: &mut tera::Context) {
    let settings = load_settings(state).await;
    if let Some(logo_id) = settings.logo_id {
        match Media::find_by_id(state.db(), logo_id).await {
            Ok(Some(logo)) => context.insert("site_logo", &logo.url()),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to load site logo"),
        }
    }
    context.insert("site", &settings);

    let menu: Vec<MenuLink> = match MenuItem::find_all(state.db()).await {
        Ok(items) => items
            .iter()
            .map(|item| MenuLink {
                label: item.label.clone(),
                href: item.href(),
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "failed to load menu");
            Vec::new()
        }
    };
    context.insert("menu", &menu);

    context.insert("current_user", &session_user(state, session).await);
    context.insert("flashes", &take_flashes(session).await);

    match generate_csrf_token(session).await {
        Ok(token) => context.insert("csrf_token", &token),
        Err(e) => warn!(error = %e, "failed to issue CSRF token"),
    }
}

/// Render a template, or a bare error page when rendering fails.
pub fn render_template(state: &AppState, template: &str, context: &tera::Context) -> Response {
    match state.theme().render(template, context) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = ?e, template = %template, "failed to render template");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(
                    r#"<!DOCTYPE html>
<html><head><title>Error</title></head>
<body><h1>Something went wrong</h1></body></html>"#,
                ),
            )
                .into_response()
        }
    }
}

/// Render a page with the site context already injected.
pub async fn render_page(
    state: &AppState,
    session: &Session,
    template: &str,
    mut context: tera::Context,
) -> Response {
    inject_site_context(state, session, &mut context).await;
    render_template(state, template, &context)
}

/// Themed 404 page.
pub async fn not_found(state: &AppState, session: &Session) -> Response {
    let mut context = tera::Context::new();
    context.insert("title", "Not found");
    let page = render_page(state, session, "404.html", context).await;
    (StatusCode::NOT_FOUND, page).into_response()
}

/// Form carrying nothing but its CSRF token.
#[derive(Debug, Deserialize)]
pub struct CsrfOnlyForm {
    #[serde(default)]
    pub csrf_token: String,
}

/// Confirmation page for a destructive action.
pub async fn render_confirm_delete(
    state: &AppState,
    session: &Session,
    label: &str,
    action: &str,
    cancel: &str,
) -> Response {
    let mut context = tera::Context::new();
    context.insert("title", &format!("Delete {label}"));
    context.insert("label", label);
    context.insert("action", action);
    context.insert("cancel", cancel);
    render_page(state, session, "admin/confirm_delete.html", context).await
}

/// `?page=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// One-based page number; anything unparseable is the first page.
    pub fn number(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }
}

/// Page navigation for list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub total_pages: i64,
    pub prev: Option<i64>,
    pub next: Option<i64>,
}

impl Pagination {
    pub fn new(page: i64, total: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = ((total.max(0) + per_page - 1) / per_page).max(1);
        Self {
            page,
            total_pages,
            prev: (page > 1).then(|| (page - 1).min(total_pages)),
            next: (page < total_pages).then_some(page + 1),
        }
    }
}

/// Row offset of a one-based page.
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(per_page)
}

/// HTML checkboxes send a value only when ticked.
pub fn checkbox(value: Option<&str>) -> bool {
    matches!(value, Some(v) if !v.is_empty() && v != "false" && v != "0")
}

/// Trimmed value, or `None` when blank.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Whether any entity tag in an `If-None-Match` header equals `etag`.
///
/// Handles comma separated lists and the `*` wildcard.
pub fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate == etag)
}
