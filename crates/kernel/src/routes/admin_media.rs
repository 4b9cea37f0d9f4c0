//! Admin routes for the media library.

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Serialize;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::file::{MAX_FILE_SIZE, MediaError, Upload};
use crate::form::{Flash, push_flash, require_csrf};
use crate::models::Media;
use crate::state::AppState;

use super::helpers::{CsrfOnlyForm, render_confirm_delete, render_page};

/// Room for the other multipart fields and boundaries.
const BODY_SLACK: usize = 64 * 1024;

/// Create the media admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/media", get(list_media))
        .route(
            "/admin/media/upload",
            get(upload_form)
                .post(upload_media)
                .layer(DefaultBodyLimit::max(MAX_FILE_SIZE + BODY_SLACK)),
        )
        .route("/admin/media/{id}/delete", get(confirm_delete_media).post(delete_media))
        .route("/admin/api/media", get(media_api))
}

/// Media as listed in the admin and the editor picker.
#[derive(Debug, Serialize)]
struct MediaRow {
    #[serde(flatten)]
    media: Media,
    url: String,
    is_image: bool,
    html_tag: String,
    markdown_tag: String,
}

impl From<Media> for MediaRow {
    fn from(media: Media) -> Self {
        Self {
            url: media.url(),
            is_image: media.is_image(),
            html_tag: media.html_tag(),
            markdown_tag: media.markdown_tag(),
            media,
        }
    }
}

/// Fields collected from the upload form.
#[derive(Debug, Default)]
struct UploadForm {
    csrf_token: String,
    description: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    form.file_name = field.file_name().map(str::to_string);
                    form.content_type = field.content_type().map(str::to_string);
                    form.data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?
                        .to_vec();
                }
                "description" => {
                    form.description = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?;
                }
                "csrf_token" => {
                    form.csrf_token = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?;
                }
                other => warn!(field = %other, "ignoring unknown upload field"),
            }
        }

        Ok(form)
    }
}

async fn render_upload_form(
    state: &AppState,
    session: &Session,
    description: &str,
    errors: &[String],
) -> Response {
    let mut context = tera::Context::new();
    context.insert("title", "Upload media");
    context.insert("values", &serde_json::json!({ "description": description }));
    context.insert("errors", errors);
    context.insert("max_size", &MAX_FILE_SIZE);

    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let page = render_page(state, session, "admin/media_upload.html", context).await;
    (status, page).into_response()
}

/// GET /admin/media
async fn list_media(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let rows: Vec<MediaRow> = Media::find_all(state.db())
        .await?
        .into_iter()
        .map(MediaRow::from)
        .collect();

    let mut context = tera::Context::new();
    context.insert("title", "Media");
    context.insert("media", &rows);
    context.insert("storage", state.media().backend());

    Ok(render_page(&state, &session, "admin/media.html", context).await)
}

/// GET /admin/media/upload
async fn upload_form(State(state): State<AppState>, session: Session) -> Response {
    render_upload_form(&state, &session, "", &[]).await
}

/// POST /admin/media/upload
async fn upload_media(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = UploadForm::read(multipart).await?;
    require_csrf(&session, &form.csrf_token).await?;

    let file_name = form.file_name.as_deref().unwrap_or_default();
    let upload = Upload {
        file_name,
        content_type: form.content_type.as_deref(),
        description: &form.description,
        data: &form.data,
    };

    match state.media().upload(upload).await {
        Ok(media) => {
            info!(media_id = %media.id, name = %media.name, "media added to library");
            push_flash(&session, Flash::success(format!("Uploaded {}.", media.name))).await;
            Ok(Redirect::to("/admin/media").into_response())
        }
        Err(e @ (MediaError::Empty | MediaError::TooLarge { .. } | MediaError::UnsupportedType(_))) => {
            let errors = [upload_message(&e)];
            Ok(render_upload_form(&state, &session, &form.description, &errors).await)
        }
        Err(e) => Err(e.into()),
    }
}

fn upload_message(e: &MediaError) -> String {
    match e {
        MediaError::Empty => "Choose a file to upload.".to_string(),
        MediaError::TooLarge { max, .. } => {
            format!("The file is too large. The limit is {} MB.", max / (1024 * 1024))
        }
        MediaError::UnsupportedType(mime) => format!("Files of type {mime} are not allowed."),
        other => other.to_string(),
    }
}

/// GET /admin/media/{id}/delete
async fn confirm_delete_media(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let media = Media::find_by_id(state.db(), id).await?.ok_or(AppError::NotFound)?;
    Ok(render_confirm_delete(
        &state,
        &session,
        &format!("file \"{}\"", media.name),
        &format!("/admin/media/{id}/delete"),
        "/admin/media",
    )
    .await)
}

/// POST /admin/media/{id}/delete
async fn delete_media(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Form(form): Form<CsrfOnlyForm>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let media = state.media().delete(id).await?;

    push_flash(&session, Flash::success(format!("Deleted {}.", media.name))).await;
    Ok(Redirect::to("/admin/media").into_response())
}

/// GET /admin/api/media - library listing for the editor's media picker.
async fn media_api(State(state): State<AppState>) -> AppResult<Json<Vec<MediaRow>>> {
    let rows = Media::find_all(state.db())
        .await?
        .into_iter()
        .map(MediaRow::from)
        .collect();
    Ok(Json(rows))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{Request, header};

    use super::*;

    async fn multipart(body: &'static str) -> Multipart {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=X")
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn upload_fields_are_read() {
        let body = "--X\r\n\
            Content-Disposition: form-data; name=\"csrf_token\"\r\n\r\ntok\r\n\
            --X\r\n\
            Content-Disposition: form-data; name=\"description\"\r\n\r\nA logo\r\n\
            --X\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"logo.png\"\r\n\
            Content-Type: image/png\r\n\r\nPNG\r\n\
            --X--\r\n";

        let form = UploadForm::read(multipart(body).await).await.unwrap();

        assert_eq!(form.csrf_token, "tok");
        assert_eq!(form.description, "A logo");
        assert_eq!(form.file_name.as_deref(), Some("logo.png"));
        assert_eq!(form.content_type.as_deref(), Some("image/png"));
        assert_eq!(form.data, b"PNG");
    }

    #[tokio::test]
    async fn truncated_text_field_is_a_bad_request() {
        let body = "--X\r\nContent-Disposition: form-data; name=\"csrf_token\"\r\n\r\ntok";

        let err = UploadForm::read(multipart(body).await).await.unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn upload_messages() {
        assert_eq!(upload_message(&MediaError::Empty), "Choose a file to upload.");
        let too_large = MediaError::TooLarge {
            size: MAX_FILE_SIZE + 1,
            max: MAX_FILE_SIZE,
        };
        assert_eq!(
            upload_message(&too_large),
            "The file is too large. The limit is 32 MB."
        );
        assert_eq!(
            upload_message(&MediaError::UnsupportedType("text/html".into())),
            "Files of type text/html are not allowed."
        );
    }
}
