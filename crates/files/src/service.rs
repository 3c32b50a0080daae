//! The upload ingestion pipeline behind a single service type.
//!
//! [`UploadService`] ties together path validation, staging, comparison, conflict
//! resolution, listing and reaping. It holds configuration only: the root, the scratch
//! directory, the size limit and a handle to the [`FileStore`]. It keeps no index of
//! uploaded files, so it is cheap to clone and share between request workers.
//!
//! ```text
//! upload ──► validate ──► stage ──► probe target ──► resolve ──► commit | discard
//! ```
//!
//! All methods block on disk I/O. Async callers should run them where blocking is allowed.

use crate::listing::{self, Conflict, ListEntry};
use crate::paths::{UploadRoot, ValidPath};
use crate::reaper;
use crate::resolver::{ConflictResolver, ResolvedTarget};
use crate::staging::{StagedFile, Stager};
use crate::store::{FileStore, LocalStore};
use crate::{CommitError, PathRejection, UploadError};
use shelf_types::{Disposition, Strategy};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub disposition: Disposition,
    /// `/`-separated path relative to the upload root; for skips, the existing target
    pub final_relative_path: String,
    pub file_name: String,
    /// Bytes received from the client
    pub size: u64,
}

/// Entry point for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct UploadService {
    store: Arc<dyn FileStore>,
    root: UploadRoot,
    scratch_dir: PathBuf,
    stager: Stager,
}

impl UploadService {
    /// Creates a service over `store`.
    ///
    /// `upload_root` and `scratch_dir` should be absolute, canonical and disjoint; the
    /// caller's configuration layer is responsible for that.
    pub fn new(
        store: Arc<dyn FileStore>,
        upload_root: PathBuf,
        scratch_dir: PathBuf,
        max_upload_bytes: Option<u64>,
    ) -> Self {
        let stager = Stager::new(Arc::clone(&store), scratch_dir.clone(), max_upload_bytes);
        Self {
            store,
            root: UploadRoot::new(upload_root),
            scratch_dir,
            stager,
        }
    }

    /// Creates a service over the local filesystem.
    pub fn local(upload_root: PathBuf, scratch_dir: PathBuf, max_upload_bytes: Option<u64>) -> Self {
        Self::new(
            Arc::new(LocalStore::new()),
            upload_root,
            scratch_dir,
            max_upload_bytes,
        )
    }

    pub fn upload_root(&self) -> &Path {
        self.root.path()
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// See [`UploadRoot::validate`].
    ///
    /// # Errors
    ///
    /// Returns the first [`PathRejection`] that applies.
    pub fn validate(&self, relative_path: &str) -> Result<ValidPath, PathRejection> {
        self.root.validate(relative_path)
    }

    /// Streams an upload into the scratch directory.
    ///
    /// # Errors
    ///
    /// See [`Stager::stage`].
    pub fn stage<R: Read + ?Sized>(&self, reader: &mut R) -> Result<StagedFile, UploadError> {
        Ok(self.stager.stage(reader)?)
    }

    /// Deletes a staged upload that will not be committed.
    pub fn discard(&self, staged: StagedFile) {
        self.stager.discard(staged);
    }

    /// Creates the target's parent directories, inspects the target and resolves the
    /// staged upload against it.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Commit` if directory creation, the target probe, or the
    /// resolver fails. The staged file is then left for the reaper.
    pub fn commit(
        &self,
        staged: StagedFile,
        target: ValidPath,
        strategy: Strategy,
    ) -> Result<UploadOutcome, UploadError> {
        if let Some(parent) = target.absolute().parent() {
            self.store
                .create_dir_all(parent)
                .map_err(|source| CommitError::CreateParent {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let size = staged.size();
        let target = ResolvedTarget::probe(self.store.as_ref(), target)?;
        let resolution =
            ConflictResolver::new(self.store.as_ref(), &self.root).resolve(staged, &target, strategy)?;

        let outcome = UploadOutcome {
            disposition: resolution.disposition,
            final_relative_path: resolution.final_path.relative_display(),
            file_name: resolution.final_path.file_name(),
            size,
        };

        match outcome.disposition {
            Disposition::Skipped(_) => tracing::info!(
                "[SKIP] {} ({}, {} bytes)",
                outcome.final_relative_path,
                outcome.disposition,
                size
            ),
            _ => tracing::info!(
                "[UPLOAD] {} ({}, {} bytes)",
                outcome.final_relative_path,
                outcome.disposition,
                size
            ),
        }

        Ok(outcome)
    }

    /// Validates, stages and commits an upload in one call.
    ///
    /// Validation happens before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Validation`, `UploadError::Staging` or `UploadError::Commit`
    /// depending on which phase failed.
    pub fn ingest<R: Read + ?Sized>(
        &self,
        relative_path: &str,
        strategy: Strategy,
        reader: &mut R,
    ) -> Result<UploadOutcome, UploadError> {
        let target = self.validate(relative_path)?;
        let staged = self.stage(reader)?;
        self.commit(staged, target, strategy)
    }

    /// Purges the scratch directory. Intended to run once at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch directory exists but cannot be listed.
    pub fn reap(&self) -> io::Result<usize> {
        reaper::reap(self.store.as_ref(), &self.scratch_dir)
    }

    /// Direct entries of the upload root.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload root cannot be read.
    pub fn list(&self) -> io::Result<Vec<ListEntry>> {
        listing::list_entries(self.store.as_ref(), &self.root)
    }

    /// Which of `paths` already exist as files.
    ///
    /// # Errors
    ///
    /// Returns an error if a metadata lookup fails.
    pub fn check_conflicts<S: AsRef<str>>(&self, paths: &[S]) -> io::Result<Vec<Conflict>> {
        listing::check_conflicts(self.store.as_ref(), &self.root, paths)
    }
}
