//! Shared vocabulary for the shelf upload service.
//!
//! These types cross crate boundaries: the ingestion pipeline produces them, the REST layer
//! serialises them, and the CLI parses them from arguments.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing shared enums from text.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// The input did not name a known conflict-resolution strategy
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

/// Conflict-resolution policy chosen by the client for an upload whose target already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Keep the existing file and commit the upload under a versioned name.
    #[default]
    Rename,
    /// Overwrite the existing file.
    Replace,
    /// Overwrite the existing file; distinguished from `Replace` only by directory-level callers.
    Merge,
    /// Keep the existing file and discard the upload.
    Skip,
}

impl Strategy {
    /// Parses a client-supplied strategy, falling back to [`Strategy::Rename`] for anything
    /// unrecognised (including empty input).
    pub fn from_lenient(input: &str) -> Self {
        input.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Rename => "rename",
            Strategy::Replace => "replace",
            Strategy::Merge => "merge",
            Strategy::Skip => "skip",
        }
    }
}

impl FromStr for Strategy {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rename" => Ok(Strategy::Rename),
            "replace" => Ok(Strategy::Replace),
            "merge" => Ok(Strategy::Merge),
            "skip" => Ok(Strategy::Skip),
            _ => Err(TypeError::UnknownStrategy(s.to_owned())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an upload was discarded without touching the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The target already holds byte-identical content.
    Identical,
    /// The client asked for `skip` and the content differs.
    UserSkip,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Identical => "identical",
            SkipReason::UserSkip => "user_skip",
        }
    }
}

/// Final disposition of a staged upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// No file existed at the target; the upload was committed there.
    New,
    /// The upload was discarded; the target is untouched.
    Skipped(SkipReason),
    /// The existing target was replaced.
    Replaced,
    /// The existing target was replaced as part of a merge.
    Merged,
    /// The upload was committed under a versioned name next to the existing target.
    Renamed,
}

impl Disposition {
    /// The action or reason code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Disposition::New => "new",
            Disposition::Skipped(reason) => reason.as_str(),
            Disposition::Replaced => "replaced",
            Disposition::Merged => "merged",
            Disposition::Renamed => "renamed",
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Disposition::Skipped(_))
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Skipped(reason) => write!(f, "skipped/{}", reason.as_str()),
            other => f.write_str(other.code()),
        }
    }
}
