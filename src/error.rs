//! Error type shared by the resolver, listing and handlers.
//!
//! Handlers return `Result<_, Error>`; the [`IntoResponse`] impl turns each
//! variant into a status code and a `{"detail": ...}` JSON body. Range
//! outcomes are not errors here, see [`crate::RangeResult`].

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid file name: {0:?}")]
    InvalidName(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidName(_) | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.http_status();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        }

        // keep filesystem details out of responses
        let detail = match &self {
            Error::Io(_) | Error::Config(_) => "internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
