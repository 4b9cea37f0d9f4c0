//! Favicons generated from the site logo.

use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::error::AppResult;
use crate::file::{FAVICON_ASSETS, FaviconAsset};
use crate::state::AppState;

/// Icons are regenerated whenever the settings are saved.
const FAVICON_CACHE_CONTROL: &str = "public, max-age=86400";

/// Create the favicon router: one route per generated icon.
pub fn router() -> Router<AppState> {
    FAVICON_ASSETS.iter().fold(Router::new(), |router, asset| {
        router.route(
            &format!("/{}", asset.name),
            get(move |State(state): State<AppState>| serve_favicon(state, asset)),
        )
    })
}

/// GET /favicon.ico, /favicon.png, /apple-touch-icon.png
async fn serve_favicon(state: AppState, asset: &'static FaviconAsset) -> AppResult<Response> {
    let data = state.media().read_asset(asset.name).await?;

    Ok((
        [
            (header::CONTENT_TYPE, asset.mime_type),
            (header::CACHE_CONTROL, FAVICON_CACHE_CONTROL),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        data,
    )
        .into_response())
}
