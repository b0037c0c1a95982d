//! Error types for notesync-core.

use thiserror::Error;

/// Result type alias using SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that make a single rule unusable for the current run.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid regular expression: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("pattern does not extract any fields")]
    NoFields,

    #[error("pattern is empty")]
    EmptyPattern,
}

/// Anomalies found while compiling a rule. The rule still runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileWarning {
    #[error("token '{{{{{0}}}}}' is not a field or special token, matched literally")]
    UnknownToken(String),

    #[error("capture group {group} mapped to '{field}' but the pattern has {available} groups")]
    CaptureOutOfRange {
        group: usize,
        field: String,
        available: usize,
    },

    #[error("field '{field}' is captured by more than one group, group {group} ignored")]
    DuplicateCapture { group: usize, field: String },

    #[error("token '{{{{{0}}}}}' appears more than once, only the first occurrence is captured")]
    RepeatedToken(String),
}

/// Errors raised by a remote service collaborator.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("service error in {action}: {message}")]
    Service { action: String, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

/// Errors raised by a document store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },
}

/// Top-level failure of one sync direction.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote service failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("document store failed: {0}")]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(#[from] CompileError),

    #[error("state error: {0}")]
    State(String),
}
