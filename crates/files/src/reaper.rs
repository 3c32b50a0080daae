//! Startup purge of the scratch directory.

use crate::store::FileStore;
use std::io::{self, ErrorKind};
use std::path::Path;

/// Removes every entry in `scratch_dir` and returns how many were removed.
///
/// The scratch directory only ever holds in-flight staging files, so anything found there
/// at startup belongs to an upload that was interrupted by a crash or restart. A missing
/// directory counts as empty. Entries that cannot be removed are logged and skipped.
///
/// # Errors
///
/// Returns an error only if the directory exists but cannot be listed.
pub fn reap(store: &dyn FileStore, scratch_dir: &Path) -> io::Result<usize> {
    let entries = match store.read_dir(scratch_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let path = scratch_dir.join(&entry.name);
        let result = if entry.meta.is_dir() {
            store.remove_dir_all(&path)
        } else {
            store.remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("failed to remove stale entry {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        tracing::info!(
            "removed {} stale staging entries from {}",
            removed,
            scratch_dir.display()
        );
    } else {
        tracing::debug!("no stale staging entries in {}", scratch_dir.display());
    }

    Ok(removed)
}
