//! # API Shared
//!
//! Wire types and response helpers for the shelf HTTP API.
//!
//! Contains:
//! - JSON request/response types with OpenAPI schemas
//! - Shared services like `HealthService`
//! - Sanitisation applied to every string embedded in a response
//!
//! Used by `api-rest`.

pub mod health;
pub mod sanitize;

pub use health::HealthService;
pub use sanitize::sanitize_text;

use serde::{Deserialize, Serialize};
use shelf_types::Disposition;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Top-level outcome reported for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Skipped,
    Error,
}

/// Response body for `POST /`.
///
/// Successful commits carry `action`; skips and errors carry `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadRes {
    pub status: UploadStatus,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UploadRes {
    /// Builds the response for a finished upload from its disposition and committed file
    /// name.
    pub fn from_disposition(disposition: Disposition, file_name: &str) -> Self {
        let path = sanitize_text(file_name);
        let code = disposition.code().to_string();
        if disposition.is_skipped() {
            Self {
                status: UploadStatus::Skipped,
                path,
                action: None,
                reason: Some(code),
            }
        } else {
            Self {
                status: UploadStatus::Success,
                path,
                action: Some(code),
                reason: None,
            }
        }
    }

    pub fn error(path: &str, reason: &str) -> Self {
        Self {
            status: UploadStatus::Error,
            path: sanitize_text(path),
            action: None,
            reason: Some(sanitize_text(reason)),
        }
    }
}

/// Generic error body for endpoints other than upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub status: UploadStatus,
    pub reason: String,
    pub message: String,
}

impl ErrorRes {
    pub fn new(reason: &str, message: &str) -> Self {
        Self {
            status: UploadStatus::Error,
            reason: sanitize_text(reason),
            message: sanitize_text(message),
        }
    }
}

/// One entry of `GET /list`. Directories end in `/` and report size 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListEntryRes {
    pub path: String,
    pub size: u64,
}

impl ListEntryRes {
    pub fn new(path: &str, size: u64) -> Self {
        Self {
            path: sanitize_text(path),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CheckConflictsReq {
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRes {
    pub path: String,
    pub existing_size: u64,
}

impl ConflictRes {
    pub fn new(path: &str, existing_size: u64) -> Self {
        Self {
            path: sanitize_text(path),
            existing_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CheckConflictsRes {
    pub conflicts: Vec<ConflictRes>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_types::SkipReason;

    #[test]
    fn test_success_response_shape() {
        let res = UploadRes::from_disposition(Disposition::New, "c.txt");
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "success", "path": "c.txt", "action": "new"})
        );
    }

    #[test]
    fn test_skipped_response_uses_reason() {
        let res =
            UploadRes::from_disposition(Disposition::Skipped(SkipReason::UserSkip), "a.txt");
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "skipped", "path": "a.txt", "reason": "user_skip"})
        );
    }

    #[test]
    fn test_error_response_is_sanitised() {
        let res = UploadRes::error("<b>.txt", "traversal");
        assert_eq!(res.path, "&lt;b&gt;.txt");
        assert_eq!(res.status, UploadStatus::Error);
        assert_eq!(res.reason.as_deref(), Some("traversal"));
    }

    #[test]
    fn test_conflict_uses_existing_size_key() {
        let json = serde_json::to_value(CheckConflictsRes {
            conflicts: vec![ConflictRes::new("a.txt", 12)],
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"conflicts": [{"path": "a.txt", "existingSize": 12}]})
        );
    }

    #[test]
    fn test_check_conflicts_req_defaults_paths() {
        let req: CheckConflictsReq = serde_json::from_str("{}").unwrap();
        assert!(req.paths.is_empty());
    }
}
