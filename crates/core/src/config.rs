//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the upload service and HTTP layer. Nothing below the binaries reads
//! process-wide environment variables, which keeps request handling deterministic and lets
//! tests build configurations side by side.

use crate::constants::{DEFAULT_MAX_UPLOAD_BYTES, INDEX_FILENAME};
use crate::{CoreError, CoreResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    upload_dir: PathBuf,
    staging_dir: PathBuf,
    static_dir: PathBuf,
    max_upload_bytes: u64,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// The upload and staging directories are created if missing (concurrent creation is
    /// tolerated) and stored in canonical form.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if:
    /// - `max_upload_bytes` is zero,
    /// - either directory cannot be created or canonicalised,
    /// - the staging directory is the upload directory, or one contains the other.
    pub fn new(
        upload_dir: PathBuf,
        staging_dir: PathBuf,
        static_dir: PathBuf,
        max_upload_bytes: u64,
    ) -> CoreResult<Self> {
        if max_upload_bytes == 0 {
            return Err(CoreError::InvalidInput(
                "max_upload_bytes must be greater than zero".into(),
            ));
        }

        let upload_dir = ensure_dir(&upload_dir)?;
        let staging_dir = ensure_dir(&staging_dir)?;

        // The reaper empties the staging directory at startup, so neither directory may
        // contain the other.
        if staging_dir.starts_with(&upload_dir) || upload_dir.starts_with(&staging_dir) {
            return Err(CoreError::StagingInsideUploads);
        }

        Ok(Self {
            upload_dir,
            staging_dir,
            static_dir,
            max_upload_bytes,
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    pub fn index_file(&self) -> PathBuf {
        self.static_dir.join(INDEX_FILENAME)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }
}

fn ensure_dir(path: &Path) -> CoreResult<PathBuf> {
    fs::create_dir_all(path).map_err(|source| CoreError::DirCreation {
        path: path.to_path_buf(),
        source,
    })?;
    path.canonicalize().map_err(|source| CoreError::DirResolve {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse the maximum upload size from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default of 10 GiB.
///
/// # Errors
///
/// Returns `CoreError::InvalidInput` if the value is not a positive integer.
pub fn max_upload_bytes_from_env_value(value: Option<String>) -> CoreResult<u64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_MAX_UPLOAD_BYTES),
        Some(v) => match v.parse::<u64>() {
            Ok(0) | Err(_) => Err(CoreError::InvalidInput(format!(
                "max upload bytes must be a positive integer, got {:?}",
                v
            ))),
            Ok(n) => Ok(n),
        },
    }
}

/// Resolve a directory setting from an optional string value, falling back to `default`
/// when unset or blank.
pub fn dir_from_env_value(value: Option<String>, default: &str) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
