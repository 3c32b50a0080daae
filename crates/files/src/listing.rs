//! Read-only views of the upload root.

use crate::paths::UploadRoot;
use crate::store::FileStore;
use std::io;

/// A direct child of the upload root.
///
/// Directories carry a trailing `/` and a size of zero.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ListEntry {
    pub path: String,
    pub size: u64,
}

/// An upload path that is already occupied by a file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// The path exactly as the client supplied it
    pub path: String,
    pub existing_size: u64,
}

/// Lists the direct entries of the upload root, sorted by name.
///
/// Entries that are neither files nor directories are left out.
///
/// # Errors
///
/// Returns an error if the root cannot be read.
pub fn list_entries(store: &dyn FileStore, root: &UploadRoot) -> io::Result<Vec<ListEntry>> {
    let mut entries: Vec<ListEntry> = store
        .read_dir(root.path())?
        .into_iter()
        .filter_map(|entry| {
            if entry.meta.is_dir() {
                Some(ListEntry {
                    path: format!("{}/", entry.name),
                    size: 0,
                })
            } else if entry.meta.is_file() {
                Some(ListEntry {
                    path: entry.name,
                    size: entry.meta.len,
                })
            } else {
                None
            }
        })
        .collect();

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// Reports which of `paths` already exist as files under the upload root.
///
/// Paths that fail validation, do not exist, or name a directory are silently omitted.
///
/// # Errors
///
/// Returns an error if a metadata lookup fails for a reason other than absence.
pub fn check_conflicts<S: AsRef<str>>(
    store: &dyn FileStore,
    root: &UploadRoot,
    paths: &[S],
) -> io::Result<Vec<Conflict>> {
    let mut conflicts = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let Ok(valid) = root.validate(path) else {
            continue;
        };
        if let Some(meta) = store.metadata(valid.absolute())? {
            if meta.is_file() {
                conflicts.push(Conflict {
                    path: path.to_owned(),
                    existing_size: meta.len,
                });
            }
        }
    }
    Ok(conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::path::Path;

    fn populated() -> (MemoryStore, UploadRoot) {
        let store = MemoryStore::new();
        store.write_file(Path::new("/up/x.txt"), b"12345").unwrap();
        store.create_dir_all(Path::new("/up/d")).unwrap();
        store.write_file(Path::new("/up/d/inner.bin"), b"1").unwrap();
        (store, UploadRoot::new("/up"))
    }

    #[test]
    fn test_list_marks_directories() {
        let (store, root) = populated();

        let entries = list_entries(&store, &root).unwrap();

        assert_eq!(
            entries,
            vec![
                ListEntry {
                    path: "d/".into(),
                    size: 0
                },
                ListEntry {
                    path: "x.txt".into(),
                    size: 5
                },
            ]
        );
    }

    #[test]
    fn test_list_missing_root_is_error() {
        let store = MemoryStore::new();
        assert!(list_entries(&store, &UploadRoot::new("/nope")).is_err());
    }

    #[test]
    fn test_conflicts_only_for_existing_files() {
        let (store, root) = populated();

        let conflicts = check_conflicts(
            &store,
            &root,
            &["x.txt", "d", "d/inner.bin", "missing.txt", "../etc/passwd", ""],
        )
        .unwrap();

        assert_eq!(
            conflicts,
            vec![
                Conflict {
                    path: "x.txt".into(),
                    existing_size: 5
                },
                Conflict {
                    path: "d/inner.bin".into(),
                    existing_size: 1
                },
            ]
        );
    }

    #[test]
    fn test_conflict_serialises_existing_size_in_camel_case() {
        let json = serde_json::to_value(Conflict {
            path: "a".into(),
            existing_size: 3,
        })
        .unwrap();
        assert_eq!(json["existingSize"], 3);
    }
}
