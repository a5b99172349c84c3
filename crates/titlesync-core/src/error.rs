//! Error types and exit codes for titlesync
//!
//! Exit codes:
//! - 0: Success
//! - 1: Generic failure
//! - 2: Usage error (bad flags/args)
//! - 3: Data error (invalid frontmatter, unreadable document)
//!
//! Errors represent resource failures only. Pipeline rejections (rate limit,
//! lock contention, policy skips) are data, not errors - see [`crate::outcome`].

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success (0)
    Success = 0,
    /// Generic failure (1)
    Failure = 1,
    /// Usage error - bad flags/args (2)
    Usage = 2,
    /// Data error - unreadable document, invalid frontmatter (3)
    Data = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// Errors that can occur during titlesync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{0}")]
    UsageError(String),

    #[error("document not found: {path}")]
    DocumentNotFound { path: String },

    #[error("no readable content source for {path}")]
    ReadFailed { path: String },

    #[error("rename target already exists: {path}")]
    RenameTargetExists { path: String },

    #[error("invalid frontmatter in {path}: {reason}")]
    InvalidFrontmatter { path: String, reason: String },

    #[error("invalid config at {path:?}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SyncError::UsageError(_) => ExitCode::Usage,

            SyncError::DocumentNotFound { .. }
            | SyncError::ReadFailed { .. }
            | SyncError::RenameTargetExists { .. }
            | SyncError::InvalidFrontmatter { .. }
            | SyncError::InvalidConfig { .. } => ExitCode::Data,

            SyncError::Io(_) | SyncError::Yaml(_) | SyncError::Json(_) | SyncError::Other(_) => {
                ExitCode::Failure
            }
        }
    }

    /// Convert error to JSON representation for structured error output
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.exit_code() as i32,
                "type": self.error_type(),
                "message": self.to_string(),
            }
        })
    }

    /// Get the error type identifier
    fn error_type(&self) -> &'static str {
        match self {
            SyncError::UsageError(_) => "usage_error",
            SyncError::DocumentNotFound { .. } => "document_not_found",
            SyncError::ReadFailed { .. } => "read_failed",
            SyncError::RenameTargetExists { .. } => "rename_target_exists",
            SyncError::InvalidFrontmatter { .. } => "invalid_frontmatter",
            SyncError::InvalidConfig { .. } => "invalid_config",
            SyncError::Io(_) => "io_error",
            SyncError::Yaml(_) => "yaml_error",
            SyncError::Json(_) => "json_error",
            SyncError::Other(_) => "other",
        }
    }
}

/// Result type alias for titlesync operations
pub type Result<T> = std::result::Result<T, SyncError>;
