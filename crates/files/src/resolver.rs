//! Deciding what happens to a staged upload when it is committed.
//!
//! ```text
//!            target absent                         rename(tmp -> target)
//! staged ─────────────────────────────► NoTarget ─────────────────────────► Committed (new)
//!    │
//!    │ target exists
//!    ▼
//! TargetExists ── identical ──► Identical ── remove(tmp) ──────────────────► Discarded (skipped/identical)
//!    │
//!    ├── skip ─────────────── remove(tmp) ─────────────────────────────────► Discarded (skipped/user_skip)
//!    ├── replace | merge ──── remove(target), rename(tmp -> target) ──────► Committed (replaced | merged)
//!    └── rename ───────────── probe "name (N).ext", rename(tmp -> versioned) ► Committed (renamed)
//! ```
//!
//! The identical-content check runs before the strategy is consulted, so re-uploading the
//! same bytes never creates a version or replaces anything.
//!
//! Every commit is a single rename out of the scratch directory. A reader of the final path
//! sees either nothing or the complete file.
//!
//! No lock is held between probing the target and renaming onto it. Two concurrent uploads
//! to the same path race: the last rename wins, and under `rename` both may allocate their
//! own versioned name even when their contents match.

use crate::compare;
use crate::paths::{UploadRoot, ValidPath};
use crate::staging::{remove_staged, StagedFile};
use crate::store::FileStore;
use crate::CommitError;
use shelf_types::{Disposition, SkipReason, Strategy};
use std::io::ErrorKind;

/// A validated target path together with what currently occupies it.
///
/// Computed fresh for every request; the filesystem is the only source of truth.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub final_path: ValidPath,
    pub exists: bool,
    pub size_if_exists: Option<u64>,
}

impl ResolvedTarget {
    /// Stats `final_path`.
    ///
    /// # Errors
    ///
    /// Returns `CommitError::Probe` if the metadata lookup fails for a reason other than
    /// the path not existing.
    pub fn probe(store: &dyn FileStore, final_path: ValidPath) -> Result<Self, CommitError> {
        let meta = store
            .metadata(final_path.absolute())
            .map_err(|source| CommitError::Probe {
                path: final_path.absolute().to_path_buf(),
                source,
            })?;

        Ok(Self {
            exists: meta.is_some(),
            size_if_exists: meta.map(|m| m.len),
            final_path,
        })
    }
}

/// Where a staged upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub disposition: Disposition,
    /// The path that now holds the upload, or for skips the untouched target.
    pub final_path: ValidPath,
}

/// Applies a [`Strategy`] to a staged upload and its target.
#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver<'a> {
    store: &'a dyn FileStore,
    root: &'a UploadRoot,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(store: &'a dyn FileStore, root: &'a UploadRoot) -> Self {
        Self { store, root }
    }

    /// Commits or discards `staged` according to `strategy`.
    ///
    /// # Errors
    ///
    /// Returns `CommitError` if removing the existing target, probing for a free versioned
    /// name, or the final rename fails. The staged file is left in place for the reaper.
    pub fn resolve(
        &self,
        staged: StagedFile,
        target: &ResolvedTarget,
        strategy: Strategy,
    ) -> Result<Resolution, CommitError> {
        if !target.exists {
            self.commit(&staged, &target.final_path)?;
            return Ok(Resolution {
                disposition: Disposition::New,
                final_path: target.final_path.clone(),
            });
        }

        if compare::identical(self.store, staged.path(), target.final_path.absolute()) {
            self.discard(staged);
            return Ok(Resolution {
                disposition: Disposition::Skipped(SkipReason::Identical),
                final_path: target.final_path.clone(),
            });
        }

        match strategy {
            Strategy::Skip => {
                self.discard(staged);
                Ok(Resolution {
                    disposition: Disposition::Skipped(SkipReason::UserSkip),
                    final_path: target.final_path.clone(),
                })
            }
            Strategy::Replace | Strategy::Merge => {
                self.remove_target(&target.final_path)?;
                self.commit(&staged, &target.final_path)?;
                let disposition = if strategy == Strategy::Merge {
                    Disposition::Merged
                } else {
                    Disposition::Replaced
                };
                Ok(Resolution {
                    disposition,
                    final_path: target.final_path.clone(),
                })
            }
            Strategy::Rename => {
                let versioned = self.next_free_version(&target.final_path)?;
                self.commit(&staged, &versioned)?;
                Ok(Resolution {
                    disposition: Disposition::Renamed,
                    final_path: versioned,
                })
            }
        }
    }

    /// Probes `name (1).ext`, `name (2).ext`, … and returns the first unused one.
    ///
    /// Each candidate goes back through [`UploadRoot::validate`], so a crafted file name
    /// cannot steer the versioned path out of the upload root.
    fn next_free_version(&self, original: &ValidPath) -> Result<ValidPath, CommitError> {
        let mut counter: u64 = 1;
        loop {
            let candidate = self
                .root
                .validate(&original.versioned_relative(counter))
                .map_err(CommitError::Confinement)?;

            let taken = self
                .store
                .metadata(candidate.absolute())
                .map_err(|source| CommitError::Probe {
                    path: candidate.absolute().to_path_buf(),
                    source,
                })?
                .is_some();

            if !taken {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    fn remove_target(&self, target: &ValidPath) -> Result<(), CommitError> {
        match self.store.remove_file(target.absolute()) {
            Ok(()) => Ok(()),
            // A concurrent replace got there first.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CommitError::RemoveTarget {
                path: target.absolute().to_path_buf(),
                source,
            }),
        }
    }

    fn commit(&self, staged: &StagedFile, target: &ValidPath) -> Result<(), CommitError> {
        self.store
            .rename(staged.path(), target.absolute())
            .map_err(|source| CommitError::Rename {
                from: staged.path().to_path_buf(),
                to: target.absolute().to_path_buf(),
                source,
            })
    }

    fn discard(&self, staged: StagedFile) {
        remove_staged(self.store, staged);
    }
}
