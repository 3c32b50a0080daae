//! Mapping pipeline failures onto HTTP responses.
//!
//! Clients get a status code and a short reason code. Underlying I/O detail is logged here
//! and never sent back.

use api_shared::{ErrorRes, UploadRes};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use shelf_files::{PathRejection, StagingError, UploadError};

#[derive(Debug)]
pub enum ApiError {
    /// The target path failed validation
    Validation {
        path: String,
        rejection: PathRejection,
    },
    /// The multipart body had no `file` part
    MissingFile,
    /// The multipart body had more than one `file` part
    MultipleFiles,
    /// The multipart body could not be decoded
    MalformedForm,
    /// The upload exceeded the configured size limit
    TooLarge { path: String },
    /// Staging or committing the upload failed
    UploadFailed { path: String },
    /// A non-upload endpoint failed
    Internal,
}

impl ApiError {
    /// Converts a pipeline error for the upload at `path`, logging the cause.
    pub fn from_upload(path: &str, err: UploadError) -> Self {
        match err {
            UploadError::Validation(rejection) => {
                tracing::info!("rejected upload path {:?}: {}", path, rejection);
                ApiError::Validation {
                    path: path.to_owned(),
                    rejection,
                }
            }
            UploadError::Staging(StagingError::TooLarge { limit }) => {
                tracing::warn!("upload {:?} exceeded {} bytes", path, limit);
                ApiError::TooLarge {
                    path: path.to_owned(),
                }
            }
            other => {
                tracing::error!("Upload error for {:?}: {:?}", path, other);
                ApiError::UploadFailed {
                    path: path.to_owned(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation { path, rejection } => (
                StatusCode::BAD_REQUEST,
                Json(UploadRes::error(&path, rejection.reason_code())),
            )
                .into_response(),
            ApiError::MissingFile => (
                StatusCode::BAD_REQUEST,
                Json(UploadRes::error("", "missing_file")),
            )
                .into_response(),
            ApiError::MultipleFiles => (
                StatusCode::BAD_REQUEST,
                Json(UploadRes::error("", "multiple_files")),
            )
                .into_response(),
            ApiError::MalformedForm => (
                StatusCode::BAD_REQUEST,
                Json(UploadRes::error("", "malformed_form")),
            )
                .into_response(),
            ApiError::TooLarge { path } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(UploadRes::error(&path, "too_large")),
            )
                .into_response(),
            ApiError::UploadFailed { path } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(UploadRes::error(&path, "upload_failed")),
            )
                .into_response(),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes::new("internal_error", "Internal error")),
            )
                .into_response(),
        }
    }
}
