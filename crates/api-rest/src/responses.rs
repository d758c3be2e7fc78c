//! Response wrappers for non-200 success codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// 201 Created with a JSON body
pub struct Created<T>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// 202 Accepted with a JSON body
pub struct Accepted<T>(pub T);

impl<T: Serialize> IntoResponse for Accepted<T> {
    fn into_response(self) -> Response {
        (StatusCode::ACCEPTED, Json(self.0)).into_response()
    }
}

/// 204 No Content
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

/// A file download with a content type and attachment filename.
pub struct FileDownload {
    pub content: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

impl IntoResponse for FileDownload {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (axum::http::header::CONTENT_TYPE, self.content_type.to_string()),
                (
                    axum::http::header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", self.filename),
                ),
            ],
            self.content,
        )
            .into_response()
    }
}
