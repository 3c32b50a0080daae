//! Streaming uploads into the scratch directory.
//!
//! An upload is written to `<scratch>/<token>.tmp`, where the token is a random 128-bit
//! UUID, before anything decides where (or whether) it ends up under the upload root.
//! The random name keeps concurrent uploads from ever sharing a staging file without any
//! locking.

use crate::constants::{CHUNK_SIZE, TEMP_SUFFIX};
use crate::store::FileStore;
use crate::StagingError;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// A fully written upload waiting in the scratch directory.
///
/// Dropping a `StagedFile` does not delete it. Committing or discarding is an explicit
/// step, and a staged file orphaned by a failed commit is left for the reaper.
#[derive(Debug, PartialEq, Eq)]
pub struct StagedFile {
    path: PathBuf,
    size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Writes upload streams to uniquely named files in the scratch directory.
#[derive(Debug, Clone)]
pub struct Stager {
    store: Arc<dyn FileStore>,
    scratch_dir: PathBuf,
    max_bytes: Option<u64>,
}

impl Stager {
    pub fn new(store: Arc<dyn FileStore>, scratch_dir: PathBuf, max_bytes: Option<u64>) -> Self {
        Self {
            store,
            scratch_dir,
            max_bytes,
        }
    }

    /// Streams `reader` to a new staging file, one chunk at a time.
    ///
    /// At most [`CHUNK_SIZE`] bytes of the upload are held in memory.
    ///
    /// # Errors
    ///
    /// Returns `StagingError` if the staging file cannot be created, the stream fails, the
    /// write fails, or the upload exceeds the configured limit. In every failure case after
    /// creation the partial staging file is removed (best effort).
    pub fn stage<R: Read + ?Sized>(&self, reader: &mut R) -> Result<StagedFile, StagingError> {
        let path = self
            .scratch_dir
            .join(format!("{}{}", Uuid::new_v4().simple(), TEMP_SUFFIX));

        let mut file = self
            .store
            .create_new(&path)
            .map_err(StagingError::Create)?;

        let copied = copy_chunked(reader, &mut file, self.max_bytes);
        drop(file);

        match copied {
            Ok(size) => {
                tracing::debug!("staged {} bytes at {}", size, path.display());
                Ok(StagedFile { path, size })
            }
            Err(e) => {
                if let Err(cleanup) = self.store.remove_file(&path) {
                    tracing::warn!(
                        "failed to remove partial staging file {}: {}",
                        path.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// Deletes a staged file that will not be committed. Failure is logged and otherwise
    /// ignored; the reaper removes anything left behind.
    pub fn discard(&self, staged: StagedFile) {
        remove_staged(self.store.as_ref(), staged);
    }
}

/// Removes a staged file from `store`, logging a failure instead of returning it.
pub(crate) fn remove_staged(store: &dyn FileStore, staged: StagedFile) {
    if let Err(e) = store.remove_file(staged.path()) {
        tracing::warn!(
            "failed to discard staging file {}: {}",
            staged.path().display(),
            e
        );
    }
}

fn copy_chunked<R: Read + ?Sized>(
    reader: &mut R,
    writer: &mut dyn Write,
    max_bytes: Option<u64>,
) -> Result<u64, StagingError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(StagingError::Read(e)),
        };

        total += n as u64;
        if let Some(limit) = max_bytes {
            if total > limit {
                return Err(StagingError::TooLarge { limit });
            }
        }

        writer.write_all(&buf[..n]).map_err(StagingError::Write)?;
    }

    writer.flush().map_err(StagingError::Write)?;
    Ok(total)
}
