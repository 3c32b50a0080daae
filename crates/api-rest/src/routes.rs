//! Request handlers and the OpenAPI document.
//!
//! The ingestion pipeline is blocking. Multipart bodies are bridged into it with
//! [`SyncIoBridge`] inside `block_in_place`, so the router must run on the multi-thread
//! runtime. Listing and conflict checks go through `spawn_blocking`.

use crate::error::ApiError;
use crate::AppState;
use api_shared::{
    CheckConflictsReq, CheckConflictsRes, ConflictRes, ErrorRes, HealthRes, HealthService,
    ListEntryRes, UploadRes, UploadStatus,
};
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use futures_util::TryStreamExt;
use shelf_files::{StagedFile, Strategy, UploadError, UploadService};
use std::io;
use tokio::runtime::Handle;
use tokio_util::io::{StreamReader, SyncIoBridge};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(health, list_uploads, upload, check_file_conflicts),
    components(schemas(
        HealthRes,
        UploadRes,
        UploadStatus,
        ErrorRes,
        ListEntryRes,
        CheckConflictsReq,
        CheckConflictsRes,
        ConflictRes,
    ))
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// # Returns
/// * `Json<HealthRes>` - Health status response containing service status
#[axum::debug_handler]
pub(crate) async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/list",
    responses(
        (status = 200, description = "Direct entries of the upload root", body = [ListEntryRes]),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// List the direct entries of the upload root
///
/// Directories are suffixed with `/` and reported with size 0. The body is pretty-printed
/// and the response is marked uncacheable so browsers always see the current state.
///
/// # Errors
/// Returns `500 Internal Server Error` if the upload root cannot be read.
#[axum::debug_handler]
pub(crate) async fn list_uploads(State(state): State<AppState>) -> Result<Response, ApiError> {
    let uploads = state.uploads.clone();
    let entries = match tokio::task::spawn_blocking(move || uploads.list()).await {
        Ok(Ok(entries)) => entries,
        Ok(Err(e)) => {
            tracing::error!("List uploads error: {:?}", e);
            return Err(ApiError::Internal);
        }
        Err(e) => {
            tracing::error!("List uploads task error: {:?}", e);
            return Err(ApiError::Internal);
        }
    };

    let body: Vec<ListEntryRes> = entries
        .iter()
        .map(|entry| ListEntryRes::new(&entry.path, entry.size))
        .collect();
    let json = serde_json::to_string_pretty(&body).map_err(|e| {
        tracing::error!("List serialisation error: {:?}", e);
        ApiError::Internal
    })?;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            ),
            (header::PRAGMA, HeaderValue::from_static("no-cache")),
            (header::EXPIRES, HeaderValue::from_static("0")),
        ],
        json,
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/",
    request_body(
        content_type = "multipart/form-data",
        description = "Parts: `file` (exactly one), `path` (optional, defaults to the \
                       file name), `strategy` (optional: rename, replace, merge or skip)"
    ),
    responses(
        (status = 200, description = "Upload committed or skipped", body = UploadRes),
        (status = 400, description = "Invalid path or malformed form", body = UploadRes),
        (status = 413, description = "Upload exceeds the size limit", body = UploadRes),
        (status = 500, description = "Internal server error", body = UploadRes)
    )
)]
/// Upload one file
///
/// Streams the `file` part into the staging directory, then resolves it against the
/// target path with the requested strategy. The response `path` is the committed file
/// name, which differs from the requested one when a new version was created.
///
/// # Errors
/// Returns:
/// - `400 Bad Request` if the path is rejected, the form is malformed, or not exactly one
///   file was sent
/// - `413 Payload Too Large` if the upload exceeds the configured limit
/// - `500 Internal Server Error` if staging or committing fails
#[axum::debug_handler]
pub(crate) async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadRes>, ApiError> {
    let form = read_form(&state.uploads, &mut multipart).await?;

    let Some((staged, file_name)) = form.file else {
        return Err(ApiError::MissingFile);
    };
    let requested = form.path.or(file_name).unwrap_or_default();

    let target = match state.uploads.validate(&requested) {
        Ok(target) => target,
        Err(rejection) => {
            state.uploads.discard(staged);
            return Err(ApiError::from_upload(
                &requested,
                UploadError::Validation(rejection),
            ));
        }
    };

    let uploads = &state.uploads;
    let outcome = tokio::task::block_in_place(|| uploads.commit(staged, target, form.strategy))
        .map_err(|e| ApiError::from_upload(&requested, e))?;

    Ok(Json(UploadRes::from_disposition(
        outcome.disposition,
        &outcome.file_name,
    )))
}

#[utoipa::path(
    post,
    path = "/check-file-conflicts",
    request_body = CheckConflictsReq,
    responses(
        (status = 200, description = "Paths that already exist as files", body = CheckConflictsRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Report which of the given paths already exist as files
///
/// Invalid paths and paths that do not exist are omitted rather than reported as errors.
///
/// # Errors
/// Returns `500 Internal Server Error` if the filesystem cannot be inspected.
#[axum::debug_handler]
pub(crate) async fn check_file_conflicts(
    State(state): State<AppState>,
    Json(req): Json<CheckConflictsReq>,
) -> Result<Json<CheckConflictsRes>, ApiError> {
    let uploads = state.uploads.clone();
    let paths = req.paths;
    let result = tokio::task::spawn_blocking(move || uploads.check_conflicts(paths.as_slice()));
    let conflicts = match result.await {
        Ok(Ok(conflicts)) => conflicts,
        Ok(Err(e)) => {
            tracing::error!("Check conflicts error: {:?}", e);
            return Err(ApiError::Internal);
        }
        Err(e) => {
            tracing::error!("Check conflicts task error: {:?}", e);
            return Err(ApiError::Internal);
        }
    };

    Ok(Json(CheckConflictsRes {
        conflicts: conflicts
            .iter()
            .map(|c| ConflictRes::new(&c.path, c.existing_size))
            .collect(),
    }))
}

/// Fields collected from an upload form.
#[derive(Default)]
struct UploadForm {
    path: Option<String>,
    strategy: Strategy,
    /// Staged body and the client-side file name
    file: Option<(StagedFile, Option<String>)>,
}

impl UploadForm {
    fn discard(self, uploads: &UploadService) {
        if let Some((staged, _)) = self.file {
            uploads.discard(staged);
        }
    }
}

/// Reads every part of the form, staging the single `file` part.
///
/// A `path` part that arrives before the file is validated immediately so a rejected
/// upload never touches disk. A blank `path` counts as absent. A second `file` part is
/// rejected. Any staged file is discarded if reading fails later.
async fn read_form(
    uploads: &UploadService,
    multipart: &mut Multipart,
) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(form),
            Err(e) => {
                tracing::warn!("malformed upload form: {}", e);
                form.discard(uploads);
                return Err(ApiError::MalformedForm);
            }
        };

        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("path") => {
                let path = match field.text().await {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!("unreadable path field: {}", e);
                        form.discard(uploads);
                        return Err(ApiError::MalformedForm);
                    }
                };
                // Browsers send an empty path for uploads outside a folder.
                if path.trim().is_empty() {
                    continue;
                }
                if form.file.is_none() {
                    if let Err(rejection) = uploads.validate(&path) {
                        return Err(ApiError::from_upload(
                            &path,
                            UploadError::Validation(rejection),
                        ));
                    }
                }
                form.path = Some(path);
            }
            Some("strategy") => match field.text().await {
                Ok(raw) => form.strategy = Strategy::from_lenient(&raw),
                Err(e) => {
                    tracing::warn!("unreadable strategy field: {}", e);
                    form.discard(uploads);
                    return Err(ApiError::MalformedForm);
                }
            },
            Some("file") if form.file.is_some() => {
                tracing::info!("rejected upload form with more than one file part");
                form.discard(uploads);
                return Err(ApiError::MultipleFiles);
            }
            Some("file") => {
                let file_name = field.file_name().map(str::to_owned);
                match stage_field(uploads, field) {
                    Ok(staged) => form.file = Some((staged, file_name)),
                    Err(e) => {
                        let label = form.path.as_deref().or(file_name.as_deref());
                        let err = ApiError::from_upload(label.unwrap_or_default(), e);
                        form.discard(uploads);
                        return Err(err);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Streams one multipart part into the staging directory.
fn stage_field(uploads: &UploadService, field: Field<'_>) -> Result<StagedFile, UploadError> {
    let handle = Handle::current();
    let stream = Box::pin(field.map_err(io::Error::other));
    let mut reader = SyncIoBridge::new_with_handle(StreamReader::new(stream), handle);
    tokio::task::block_in_place(|| uploads.stage(&mut reader))
}
