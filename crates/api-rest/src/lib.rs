//! # API REST
//!
//! REST API for the shelf upload service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (multipart decoding, JSON responses, CORS, static files)
//!
//! Uses `api-shared` for wire types and `shelf-files` for the ingestion pipeline.
//!
//! The upload handler bridges request bodies into blocking I/O with `block_in_place`, so
//! [`router`] must be served from a multi-thread tokio runtime.

#![warn(rust_2018_idioms)]

mod error;
mod routes;

pub use error::ApiError;
pub use routes::ApiDoc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, get_service, post};
use axum::Router;
use shelf_core::CoreConfig;
use shelf_files::UploadService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state for the REST API server
///
/// Holds the resolved configuration and the upload service shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub uploads: Arc<UploadService>,
}

impl AppState {
    /// Builds state with an upload service over the local filesystem.
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        let uploads = UploadService::local(
            cfg.upload_dir().to_path_buf(),
            cfg.staging_dir().to_path_buf(),
            Some(cfg.max_upload_bytes()),
        );
        Self::with_uploads(cfg, uploads)
    }

    pub fn with_uploads(cfg: Arc<CoreConfig>, uploads: UploadService) -> Self {
        Self {
            cfg,
            uploads: Arc::new(uploads),
        }
    }
}

/// Builds the application router.
///
/// `GET /` serves `index.html` from the static directory and any unmatched GET falls back
/// to the static directory itself. The framework body limit is disabled on the upload
/// route; the staging writer enforces the configured limit instead.
pub fn router(state: AppState) -> Router {
    let static_dir = state.cfg.static_dir().to_path_buf();
    let index_file = state.cfg.index_file();

    Router::new()
        .route(
            "/",
            get_service(ServeFile::new(index_file))
                .post(routes::upload)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/list", get(routes::list_uploads))
        .route("/check-file-conflicts", post(routes::check_file_conflicts))
        .route("/health", get(routes::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
