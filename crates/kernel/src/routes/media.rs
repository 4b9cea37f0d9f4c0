//! Public media delivery with conditional requests.

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use super::helpers::etag_matches;
use crate::error::AppResult;
use crate::state::AppState;

/// Uploaded files never change under the same key.
const MEDIA_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Create the media router.
pub fn router() -> Router<AppState> {
    Router::new().route("/media/{*path}", get(serve_media))
}

/// GET /media/{*path}
async fn serve_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<String>,
) -> AppResult<Response> {
    let media = state.media().find(path.trim_start_matches('/')).await?;
    let etag = media.etag();

    if etag_matches(&headers, &etag) {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [
                (header::ETAG, etag),
                (header::CACHE_CONTROL, MEDIA_CACHE_CONTROL.to_string()),
            ],
        )
            .into_response());
    }

    let data = state.media().read(&media).await?;

    let mut response = (
        [
            (header::CONTENT_TYPE, media.mime_type.clone()),
            (header::ETAG, etag),
            (header::CACHE_CONTROL, MEDIA_CACHE_CONTROL.to_string()),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        ],
        Body::from(data),
    )
        .into_response();

    if let Some(value) = media
        .content_disposition()
        .and_then(|v| HeaderValue::from_str(&v).ok())
    {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}
