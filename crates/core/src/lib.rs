//! # Shelf Core
//!
//! Startup configuration for the shelf upload service.
//!
//! This crate resolves and validates settings once, at process start:
//! - upload, staging and static directories
//! - the per-upload size limit
//!
//! **No HTTP concerns**: routing and response formatting belong in `api-rest` and
//! `api-shared`; the ingestion pipeline itself lives in `shelf-files`.

pub mod config;
pub mod constants;
mod error;

pub use config::CoreConfig;
pub use constants::*;
pub use error::{CoreError, CoreResult};
