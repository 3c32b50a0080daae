//! Confinement of client-supplied paths to the upload root.
//!
//! Clients name upload targets with relative paths such as `photos/2024/a.jpg`. Before any
//! byte touches the disk those paths are checked here, and every committed file path,
//! including versioned names generated during conflict resolution, is produced by
//! [`UploadRoot::validate`].
//!
//! Validation is a pure function of the input string and the root. It never touches the
//! filesystem and never panics; every rejection is a [`PathRejection`] value.

use crate::PathRejection;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// The single directory tree that committed files may be written to.
#[derive(Debug, Clone)]
pub struct UploadRoot {
    root: PathBuf,
    /// `root` followed by exactly one separator; every accepted path must start with this.
    prefix: String,
}

/// A target path that has passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPath {
    absolute: PathBuf,
    relative: PathBuf,
}

impl UploadRoot {
    /// `root` should already be absolute and canonical; no resolution happens here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut prefix = root.to_string_lossy().into_owned();
        if !prefix.ends_with(MAIN_SEPARATOR) {
            prefix.push(MAIN_SEPARATOR);
        }
        Self { root, prefix }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Validates a client-supplied relative path.
    ///
    /// Rules are applied in order and the first failure wins:
    ///
    /// 1. empty or whitespace-only input is `EmptyPath`
    /// 2. any NUL character is `NullByte`
    /// 3. a leading separator, an absolute or drive-prefixed path, or any `..` segment is
    ///    `Traversal`
    /// 4. the joined path must start with the root plus a separator, otherwise `OutsideRoot`
    ///
    /// Backslashes are treated as separators. `.` segments are dropped.
    ///
    /// # Errors
    ///
    /// Returns the first [`PathRejection`] that applies.
    pub fn validate(&self, relative: &str) -> Result<ValidPath, PathRejection> {
        if relative.trim().is_empty() {
            return Err(PathRejection::EmptyPath);
        }

        if relative.contains('\0') {
            return Err(PathRejection::NullByte);
        }

        let normalised = relative.replace('\\', "/");
        if normalised.starts_with('/') || Path::new(&normalised).is_absolute() {
            return Err(PathRejection::Traversal);
        }

        let mut clean = PathBuf::new();
        for component in Path::new(&normalised).components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(PathRejection::Traversal)
                }
            }
        }

        // Joining an empty path would yield `root/`, which passes the prefix check.
        if clean.as_os_str().is_empty() {
            return Err(PathRejection::OutsideRoot);
        }

        let absolute = self.root.join(&clean);
        if !self.contains(&absolute) {
            return Err(PathRejection::OutsideRoot);
        }

        Ok(ValidPath {
            absolute,
            relative: clean,
        })
    }

    /// String-prefix confinement check against `root + separator`.
    ///
    /// A sibling such as `/srv/uploads2` does not pass for a root of `/srv/uploads`, and
    /// neither does the root itself.
    pub fn contains(&self, candidate: &Path) -> bool {
        candidate.to_string_lossy().starts_with(&self.prefix)
    }
}

impl ValidPath {
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// The relative path with `/` separators, as reported to clients.
    pub fn relative_display(&self) -> String {
        slash_joined(&self.relative)
    }

    pub fn file_name(&self) -> String {
        self.relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Relative path of the `counter`-th versioned sibling, e.g. `docs/a (2).txt`.
    pub fn versioned_relative(&self, counter: u64) -> String {
        let name = versioned_name(&self.file_name(), counter);
        match self.relative.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                format!("{}/{}", slash_joined(parent), name)
            }
            _ => name,
        }
    }
}

fn slash_joined(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Splits a file name into stem and extension the way most desktop file managers do:
/// the extension starts at the last `.`, ignoring leading dots, so `.bashrc` has none.
fn split_extension(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(idx) => name.split_at(leading + idx),
        None => (name, ""),
    }
}

/// Inserts a bracketed counter before the extension: `report.pdf` becomes `report (1).pdf`.
pub fn versioned_name(file_name: &str, counter: u64) -> String {
    let (stem, ext) = split_extension(file_name);
    format!("{} ({}){}", stem, counter, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> UploadRoot {
        UploadRoot::new("/srv/uploads")
    }

    #[test]
    fn test_accepts_nested_relative_path() {
        let valid = root().validate("a/b/c.txt").unwrap();
        assert_eq!(valid.absolute(), Path::new("/srv/uploads/a/b/c.txt"));
        assert_eq!(valid.relative_display(), "a/b/c.txt");
        assert_eq!(valid.file_name(), "c.txt");
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert_eq!(root().validate(""), Err(PathRejection::EmptyPath));
        assert_eq!(root().validate("   \t"), Err(PathRejection::EmptyPath));
    }

    #[test]
    fn test_rejects_null_byte_before_traversal() {
        assert_eq!(root().validate("../a\0b"), Err(PathRejection::NullByte));
    }

    #[test]
    fn test_rejects_traversal_forms() {
        for input in [
            "/etc/passwd",
            "../secret",
            "a/../../b",
            "a/..",
            "\\windows\\system32",
            "a\\..\\..\\b",
        ] {
            assert_eq!(
                root().validate(input),
                Err(PathRejection::Traversal),
                "input: {input:?}"
            );
        }
    }

    #[test]
    fn test_dot_only_path_resolves_to_root_and_is_rejected() {
        assert_eq!(root().validate("./"), Err(PathRejection::OutsideRoot));
        assert_eq!(root().validate("."), Err(PathRejection::OutsideRoot));
    }

    #[test]
    fn test_dots_inside_names_are_fine() {
        let valid = root().validate("./notes/v1..2.txt").unwrap();
        assert_eq!(valid.relative_display(), "notes/v1..2.txt");
    }

    #[test]
    fn test_backslashes_are_separators() {
        let valid = root().validate("dir\\sub\\f.bin").unwrap();
        assert_eq!(valid.relative_display(), "dir/sub/f.bin");
    }

    #[test]
    fn test_contains_rejects_sibling_prefix() {
        let root = root();
        assert!(!root.contains(Path::new("/srv/uploads2/a.txt")));
        assert!(!root.contains(Path::new("/srv/uploads")));
        assert!(root.contains(Path::new("/srv/uploads/a.txt")));
    }

    #[test]
    fn test_versioned_name_inserts_counter_before_extension() {
        assert_eq!(versioned_name("report.pdf", 1), "report (1).pdf");
        assert_eq!(versioned_name("archive.tar.gz", 2), "archive.tar (2).gz");
        assert_eq!(versioned_name("Makefile", 3), "Makefile (3)");
        assert_eq!(versioned_name(".bashrc", 1), ".bashrc (1)");
        assert_eq!(versioned_name(".config.json", 1), ".config (1).json");
    }

    #[test]
    fn test_versioned_relative_keeps_directory() {
        let valid = root().validate("docs/a.txt").unwrap();
        assert_eq!(valid.versioned_relative(4), "docs/a (4).txt");

        let top = root().validate("a.txt").unwrap();
        assert_eq!(top.versioned_relative(1), "a (1).txt");
    }
}
