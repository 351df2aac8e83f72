//! Error taxonomy shared by every component.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Whether a failed model call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    Transient,
    Permanent,
}

impl fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErrorKind::Transient => f.write_str("transient"),
            ModelErrorKind::Permanent => f.write_str("permanent"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "model request failed ({kind}{}): {message}",
    .status.map(|s| format!(", HTTP {s}")).unwrap_or_default()
)]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ModelError {
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self { kind: ModelErrorKind::Transient, status, message: message.into() }
    }

    pub fn permanent(status: Option<u16>, message: impl Into<String>) -> Self {
        Self { kind: ModelErrorKind::Permanent, status, message: message.into() }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ModelErrorKind::Transient
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Argument(String),

    #[error("conflicting arguments: {first} cannot be combined with {second}")]
    ArgumentConflict { first: String, second: String },

    #[error("path not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied: {}", .path.display())]
    Permission { path: PathBuf },

    #[error("I/O error while {operation} {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} does not look like a text file", .path.display())]
    Binary { path: PathBuf },

    #[error("{} already exists (pass --force to overwrite)", .path.display())]
    OutputExists { path: PathBuf },

    #[error("{path} does not fit the prompt ceiling of {ceiling} bytes")]
    PromptTooLarge { path: String, ceiling: usize },

    #[error(
        "the request alone needs {needed} bytes but the prompt ceiling is {ceiling} bytes; \
         shorten it or raise --max-prompt-bytes"
    )]
    RequestTooLarge { needed: usize, ceiling: usize },

    #[error("all {failed} files failed; nothing was written")]
    FolderFailed { failed: usize },

    #[error("missing {var} environment variable")]
    MissingCredential { var: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Usage(#[from] clap::Error),
}

impl AppError {
    /// Classify an OS error for `path` into the user-facing taxonomy.
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => AppError::Permission { path },
            _ => AppError::Io { operation, path, source },
        }
    }

    pub fn missing(value: &str) -> Self {
        AppError::Argument(format!("missing required value: {value}"))
    }

    pub fn conflict(first: &str, second: &str) -> Self {
        AppError::ArgumentConflict { first: first.to_string(), second: second.to_string() }
    }
}
