//! Filesystem access behind a narrow interface.
//!
//! Every component in the ingestion pipeline reaches the disk through [`FileStore`] rather
//! than calling `std::fs` directly. [`LocalStore`] is the production backend; [`MemoryStore`]
//! keeps a whole tree in memory so that pipeline behaviour can be exercised without touching
//! a real filesystem.
//!
//! The filesystem is the only persistent state in the service. Nothing here caches
//! metadata: each call observes the tree as it is at that moment.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Cursor, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The kind of a filesystem entry, as seen through symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Sockets, fifos, devices and anything else that is neither a file nor a directory
    Other,
}

/// Result of a `stat` through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub kind: EntryKind,
    /// Length in bytes; zero for directories
    pub len: u64,
}

impl EntryMeta {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// A direct child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub meta: EntryMeta,
}

/// Resource-access interface used by the ingestion pipeline.
///
/// Implementations must be safe to share between request workers. No method takes a lock
/// that outlives the call, so concurrent uploads only ever contend on the filesystem itself.
pub trait FileStore: Send + Sync + fmt::Debug {
    /// Returns `Ok(None)` when nothing exists at `path`.
    fn metadata(&self, path: &Path) -> io::Result<Option<EntryMeta>>;

    /// Creates `path` and all missing ancestors. Succeeds if the directory already exists,
    /// including when another worker created it concurrently.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Creates a new file for writing, failing with `AlreadyExists` if `path` is taken.
    fn create_new(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Atomically moves a file to `to`, replacing any file already there.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Lists direct children of `path`. Entries that vanish or dangle while listing are
    /// omitted.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
}

/// [`FileStore`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStore;

impl LocalStore {
    pub fn new() -> Self {
        Self
    }
}

fn meta_from_std(meta: &fs::Metadata) -> EntryMeta {
    let kind = if meta.is_dir() {
        EntryKind::Dir
    } else if meta.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    };
    let len = if kind == EntryKind::File { meta.len() } else { 0 };
    EntryMeta { kind, len }
}

impl FileStore for LocalStore {
    fn metadata(&self, path: &Path) -> io::Result<Option<EntryMeta>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(meta_from_std(&meta))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        match fs::create_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn create_new(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Box::new(file))
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            // Follow symlinks so a link to a directory lists as a directory.
            let meta = match fs::metadata(entry.path()) {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                meta: meta_from_std(&meta),
            });
        }
        Ok(entries)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

type Tree = BTreeMap<PathBuf, Node>;

/// In-memory [`FileStore`].
///
/// Cloning yields a handle to the same tree. Paths are treated lexically; there are no
/// symlinks.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tree: Arc<Mutex<Tree>>,
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

fn parent_is_dir(tree: &Tree, path: &Path) -> bool {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            matches!(tree.get(parent), Some(Node::Dir))
        }
        _ => true,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes a whole file, creating parent directories as needed.
    pub fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }
        let mut tree = self.lock();
        if let Some(Node::Dir) = tree.get(path) {
            return Err(io::Error::other(format!(
                "is a directory: {}",
                path.display()
            )));
        }
        tree.insert(path.to_path_buf(), Node::File(contents.to_vec()));
        Ok(())
    }

    /// Returns a copy of a file's contents, or `None` if no file exists at `path`.
    pub fn read_file(&self, path: &Path) -> Option<Vec<u8>> {
        match self.lock().get(path) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Paths of every file at or below `dir`, in sorted order.
    pub fn files_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.lock()
            .iter()
            .filter(|(path, node)| matches!(node, Node::File(_)) && path.starts_with(dir))
            .map(|(path, _)| path.clone())
            .collect()
    }
}

struct MemoryWriter {
    tree: Arc<Mutex<Tree>>,
    path: PathBuf,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
        match tree.get_mut(&self.path) {
            Some(Node::File(data)) => {
                data.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(not_found(&self.path)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileStore for MemoryStore {
    fn metadata(&self, path: &Path) -> io::Result<Option<EntryMeta>> {
        Ok(self.lock().get(path).map(|node| match node {
            Node::Dir => EntryMeta {
                kind: EntryKind::Dir,
                len: 0,
            },
            Node::File(data) => EntryMeta {
                kind: EntryKind::File,
                len: data.len() as u64,
            },
        }))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock();
        let mut ancestors: Vec<&Path> = path
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        ancestors.reverse();
        for dir in ancestors {
            match tree.get(dir) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => {
                    return Err(io::Error::new(
                        ErrorKind::AlreadyExists,
                        format!("not a directory: {}", dir.display()),
                    ))
                }
                None => {
                    tree.insert(dir.to_path_buf(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn create_new(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let mut tree = self.lock();
        if tree.contains_key(path) {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("file exists: {}", path.display()),
            ));
        }
        if !parent_is_dir(&tree, path) {
            return Err(not_found(path));
        }
        tree.insert(path.to_path_buf(), Node::File(Vec::new()));
        Ok(Box::new(MemoryWriter {
            tree: Arc::clone(&self.tree),
            path: path.to_path_buf(),
        }))
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        match self.lock().get(path) {
            Some(Node::File(data)) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(Node::Dir) => Err(io::Error::other(format!(
                "is a directory: {}",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut tree = self.lock();
        let data = match tree.get(from) {
            Some(Node::File(data)) => data.clone(),
            Some(Node::Dir) => {
                return Err(io::Error::new(
                    ErrorKind::Unsupported,
                    "renaming directories is not supported",
                ))
            }
            None => return Err(not_found(from)),
        };
        if let Some(Node::Dir) = tree.get(to) {
            return Err(io::Error::other(format!(
                "is a directory: {}",
                to.display()
            )));
        }
        if !parent_is_dir(&tree, to) {
            return Err(not_found(to));
        }
        tree.remove(from);
        tree.insert(to.to_path_buf(), Node::File(data));
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock();
        match tree.get(path) {
            Some(Node::File(_)) => {
                tree.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(io::Error::other(format!(
                "is a directory: {}",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock();
        if !matches!(tree.get(path), Some(Node::Dir)) {
            return Err(not_found(path));
        }
        tree.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let tree = self.lock();
        if !matches!(tree.get(path), Some(Node::Dir)) {
            return Err(not_found(path));
        }
        Ok(tree
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .filter_map(|(p, node)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                let meta = match node {
                    Node::Dir => EntryMeta {
                        kind: EntryKind::Dir,
                        len: 0,
                    },
                    Node::File(data) => EntryMeta {
                        kind: EntryKind::File,
                        len: data.len() as u64,
                    },
                };
                Some(DirEntry { name, meta })
            })
            .collect())
    }
}
