//! Request-level error taxonomy.
//!
//! Malformed range headers never reach this module: they are absorbed by
//! the range interpreter and answered with a full 200 response. Everything
//! here is a terminal request failure, mapped to a status code and a JSON
//! `{"detail": ...}` body.

use std::io;

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::linear::LinearizeError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("upload is missing a file field")]
    MissingFile,

    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("error processing PDF: {0}")]
    Linearize(#[from] LinearizeError),

    #[error("storage failure: {0}")]
    Storage(#[from] io::Error),
}

impl ApiError {
    /// Map an I/O failure on a named document to the client-facing error:
    /// a missing file is 404, anything else is a storage failure.
    pub fn from_io(name: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ApiError::NotFound(name.to_owned()),
            io::ErrorKind::InvalidInput => ApiError::InvalidName(name.to_owned()),
            _ => ApiError::Storage(err),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidName(_) | ApiError::MissingFile | ApiError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Linearize(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}
