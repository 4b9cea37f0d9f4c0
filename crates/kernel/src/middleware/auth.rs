//! Session authentication gate for the admin area.
//!
//! A request passes only when its session cookie resolves to an unexpired
//! session holding a user id whose user still exists. Anything else clears
//! the session and redirects to the login form.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, HeaderValue, Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tower_sessions::cookie::Cookie;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;
use crate::session::{SESSION_COOKIE_NAME, SESSION_USER_ID};
use crate::state::AppState;

/// The authenticated user, available to handlers behind [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Resolve the session's user, if any.
pub async fn session_user(state: &AppState, session: &Session) -> Option<User> {
    let user_id = match session.get::<Uuid>(SESSION_USER_ID).await {
        Ok(Some(id)) => id,
        Ok(None) => return None,
        Err(e) => {
            debug!(error = %e, "unreadable session");
            return None;
        }
    };

    match User::find_by_id(state.db(), user_id).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, %user_id, "failed to load session user");
            None
        }
    }
}

/// Middleware rejecting requests without a logged-in user.
pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(user) = session_user(&state, &session).await {
        request.extensions_mut().insert(CurrentUser(user));
        return next.run(request).await;
    }

    if let Err(e) = session.flush().await {
        warn!(error = %e, "failed to flush rejected session");
    }

    let target = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), |pq| pq.to_string());
    let mut response = Redirect::to(&login_url(&target)).into_response();

    if has_session_cookie(request.headers()) {
        let mut removal = Cookie::build((SESSION_COOKIE_NAME, "")).path("/").build();
        removal.make_removal();
        if let Ok(value) = HeaderValue::from_str(&removal.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

/// Login URL that returns to `target` afterwards.
pub fn login_url(target: &str) -> String {
    format!("/login?next={}", urlencoding::encode(target))
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/admin",
    }
}

fn has_session_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .flatten()
        .any(|c| c.name() == SESSION_COOKIE_NAME)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn login_url_encodes_target() {
        assert_eq!(login_url("/admin"), "/login?next=%2Fadmin");
        assert_eq!(
            login_url("/admin/posts?page=2"),
            "/login?next=%2Fadmin%2Fposts%3Fpage%3D2"
        );
    }

    #[test]
    fn next_must_be_local() {
        assert_eq!(safe_next(Some("/admin/posts")), "/admin/posts");
        assert_eq!(safe_next(Some("//evil.example")), "/admin");
        assert_eq!(safe_next(Some("https://evil.example")), "/admin");
        assert_eq!(safe_next(Some("/\\evil.example")), "/admin");
        assert_eq!(safe_next(None), "/admin");
    }

    #[test]
    fn detects_session_cookie() {
        let mut headers = HeaderMap::new();
        assert!(!has_session_cookie(&headers));

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; quire_session=abc"));
        assert!(has_session_cookie(&headers));

        headers.insert(header::COOKIE, HeaderValue::from_static("quire_session_old=abc"));
        assert!(!has_session_cookie(&headers));
    }
}
