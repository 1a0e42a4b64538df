use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

use crate::{auth::session::SessionError, services::files::FileError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    /// Logs the underlying fault and answers with a generic 500.
    pub fn internal<E: Display>(error: E) -> Self {
        tracing::error!(error = %error, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<SessionError> for AppError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::Unauthorized => AppError::unauthorized(),
            SessionError::Cache(err) => AppError::internal(err),
            SessionError::Store(err) => AppError::internal(err),
        }
    }
}

impl From<FileError> for AppError {
    fn from(value: FileError) -> Self {
        match value {
            FileError::Validation(message) => AppError::bad_request(message),
            FileError::InvalidParent(reason) => AppError::bad_request(reason.to_string()),
            FileError::NotAFile => AppError::bad_request("A folder doesn't have content"),
            // Non-owners learn nothing about private files: forbidden reads look missing.
            FileError::NotFound | FileError::Forbidden => AppError::not_found(),
            FileError::Store(err) => AppError::internal(err),
            FileError::Storage(err) => AppError::internal(err),
        }
    }
}

impl From<crate::repository::StoreError> for AppError {
    fn from(value: crate::repository::StoreError) -> Self {
        AppError::internal(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}
