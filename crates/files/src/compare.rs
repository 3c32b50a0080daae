//! Byte-for-byte file comparison.

use crate::constants::CHUNK_SIZE;
use crate::store::FileStore;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

/// Returns `true` only if both paths are regular files with identical contents.
///
/// Sizes are compared first so files of different length are never read. Any error while
/// reading counts as "not identical": the caller then keeps the upload as a new version
/// rather than silently dropping it.
pub fn identical(store: &dyn FileStore, a: &Path, b: &Path) -> bool {
    match try_identical(store, a, b) {
        Ok(same) => same,
        Err(e) => {
            tracing::warn!(
                "comparison of {} and {} failed, treating as different: {}",
                a.display(),
                b.display(),
                e
            );
            false
        }
    }
}

fn try_identical(store: &dyn FileStore, a: &Path, b: &Path) -> io::Result<bool> {
    let (Some(meta_a), Some(meta_b)) = (store.metadata(a)?, store.metadata(b)?) else {
        return Ok(false);
    };
    if !meta_a.is_file() || !meta_b.is_file() || meta_a.len != meta_b.len {
        return Ok(false);
    }

    let mut reader_a = store.open(a)?;
    let mut reader_b = store.open(b)?;
    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];

    loop {
        let n_a = read_full(&mut reader_a, &mut buf_a)?;
        let n_b = read_full(&mut reader_b, &mut buf_b)?;
        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

/// Fills `buf` unless the stream ends first; returns the number of bytes read.
fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
