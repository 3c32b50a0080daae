//! Shelf File Ingestion
//!
//! This crate implements the upload ingestion pipeline for shelf: everything that happens
//! between "a client sent us a byte stream and a relative path" and "a file sits at its
//! final location under the upload directory" (or was deliberately not written).
//!
//! ## Design Principles
//!
//! - Client paths are confined to the upload root before any byte is written
//! - Uploads are staged in a separate scratch directory, never in place
//! - Re-uploading identical content is a no-op, whatever strategy the client asked for
//! - Files become visible at their final path through a single atomic rename
//! - The filesystem is the only state; nothing is cached between requests
//! - Leftover staging files from interrupted runs are purged at startup
//!
//! ## Storage Layout
//!
//! ```text
//! <upload_root>/              # committed files, mirroring client paths
//! ├── report.pdf
//! ├── report (1).pdf          # versioned by the `rename` strategy
//! └── photos/2024/a.jpg
//!
//! <scratch_dir>/              # in-flight uploads only, purged at startup
//! └── 3f2a…c9e1.tmp
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use shelf_files::{Strategy, UploadService};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = UploadService::local(
//!     PathBuf::from("/srv/uploads"),
//!     PathBuf::from("/srv/.shelf-staging"),
//!     None,
//! );
//! service.reap()?;
//!
//! let mut body = std::io::Cursor::new(b"hello".to_vec());
//! let outcome = service.ingest("notes/hello.txt", Strategy::Rename, &mut body)?;
//! println!("{} -> {}", outcome.disposition, outcome.final_relative_path);
//! # Ok(())
//! # }
//! ```

mod compare;
mod constants;
mod listing;
mod paths;
mod reaper;
mod resolver;
mod service;
mod staging;
pub mod store;

pub use compare::identical;
pub use constants::{CHUNK_SIZE, TEMP_SUFFIX};
pub use listing::{Conflict, ListEntry};
pub use paths::{versioned_name, UploadRoot, ValidPath};
pub use resolver::{ConflictResolver, ResolvedTarget, Resolution};
pub use service::{UploadOutcome, UploadService};
pub use shelf_types::{Disposition, SkipReason, Strategy};
pub use staging::{StagedFile, Stager};
pub use store::{FileStore, LocalStore, MemoryStore};

use std::path::PathBuf;

/// Reasons a client-supplied path is refused.
///
/// These are ordinary values, not faults: callers turn them into structured 400-class
/// responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PathRejection {
    /// Empty or whitespace-only path
    #[error("path is empty")]
    EmptyPath,

    /// Path contains a NUL character
    #[error("path contains a null byte")]
    NullByte,

    /// Absolute path, leading separator, or `..` segment
    #[error("path attempts directory traversal")]
    Traversal,

    /// Path does not resolve strictly inside the upload root
    #[error("path resolves outside the upload directory")]
    OutsideRoot,
}

impl PathRejection {
    /// Stable machine-readable code reported to clients.
    pub fn reason_code(&self) -> &'static str {
        match self {
            PathRejection::EmptyPath => "empty_path",
            PathRejection::NullByte => "null_byte",
            PathRejection::Traversal => "traversal",
            PathRejection::OutsideRoot => "outside_root",
        }
    }
}

/// Errors while streaming an upload into the scratch directory
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("failed to create staging file: {0}")]
    Create(std::io::Error),

    /// The upload stream itself failed, typically because the client disconnected
    #[error("failed to read upload stream: {0}")]
    Read(std::io::Error),

    #[error("failed to write staging file: {0}")]
    Write(std::io::Error),

    #[error("upload exceeds the limit of {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Errors while moving a staged upload to its final location
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error(
        "failed to create directory {path}: {source}",
        path = path.display()
    )]
    CreateParent {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to inspect {path}: {source}", path = path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "failed to remove existing file {path}: {source}",
        path = path.display()
    )]
    RemoveTarget {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "failed to move {from} to {to}: {source}",
        from = from.display(),
        to = to.display()
    )]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A generated versioned name failed confinement
    #[error("versioned path rejected: {0}")]
    Confinement(PathRejection),
}

/// Errors from the ingestion pipeline as a whole
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid path: {0}")]
    Validation(#[from] PathRejection),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Commit(#[from] CommitError),
}
