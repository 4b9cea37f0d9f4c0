//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::file::{MediaError, StorageError};
use crate::menu::MenuError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Menu(#[from] MenuError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Menu(MenuError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Menu(MenuError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Menu(_) => StatusCode::BAD_REQUEST,
            AppError::Media(MediaError::NotFound | MediaError::Storage(StorageError::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            AppError::Media(
                MediaError::Empty | MediaError::TooLarge { .. } | MediaError::UnsupportedType(_),
            ) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // User-facing errors carry their message; backend failures are logged
        // and reported vaguely.
        let body = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            AppError::Storage(e @ (StorageError::Io { .. } | StorageError::Backend(_))) => {
                tracing::error!(error = %e, "storage error");
                "internal server error".to_string()
            }
            AppError::Menu(MenuError::Database(e)) => {
                tracing::error!(error = %e, "menu database error");
                "internal server error".to_string()
            }
            AppError::Media(
                e @ (MediaError::Record(_)
                | MediaError::Storage(StorageError::Io { .. } | StorageError::Backend(_))),
            ) => {
                tracing::error!(error = ?e, "media error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
