use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::UserServiceError;

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures that end a request with an error page rather than a message.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("User service error: {0}")]
    UserService(#[from] UserServiceError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Not found")]
    NotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found"),
            other => {
                tracing::error!("Request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, error_message).into_response()
    }
}
