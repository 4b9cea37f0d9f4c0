//! Stylesheet for highlighted code blocks.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::state::AppState;

use super::helpers::{etag_matches, load_settings};

/// Create the highlight stylesheet router.
pub fn router() -> Router<AppState> {
    Router::new().route("/highlight.css", get(highlight_css))
}

/// GET /highlight.css - the style chosen in the site settings.
async fn highlight_css(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let settings = load_settings(&state).await;
    let sheet = state.highlight().sheet(&settings.highlight_style);
    let etag = sheet.etag().to_string();

    if etag_matches(&headers, &etag) {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
    }

    (
        [
            (header::CONTENT_TYPE, "text/css; charset=utf-8".to_string()),
            (header::ETAG, etag),
        ],
        sheet.css().to_string(),
    )
        .into_response()
}
