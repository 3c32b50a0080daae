//! Constants used throughout the shelf core crate.
//!
//! Defaults for every setting that can be overridden through the environment.

/// Default listen address for the HTTP server.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Default directory for committed uploads.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default scratch directory for in-flight uploads. Kept outside the upload directory.
pub const DEFAULT_STAGING_DIR: &str = ".shelf-staging";

/// Default directory served for `GET /` and other static requests.
pub const DEFAULT_STATIC_DIR: &str = ".";

/// Default maximum size of a single upload (10 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Entry document served for `GET /`.
pub const INDEX_FILENAME: &str = "index.html";
