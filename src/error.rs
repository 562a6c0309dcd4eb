use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification callers branch on instead of matching messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; never retried
    InvalidArgument,
    /// The requested module version does not exist upstream
    NotFound,
    /// Storage, network or deadline failure; the caller may retry
    Transient,
    /// Startup cannot continue
    Fatal,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to open database at {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StoreError::Open { .. } => ErrorKind::Fatal,
            StoreError::Database(_)
            | StoreError::Query { .. }
            | StoreError::Serialization(_)
            | StoreError::LockPoisoned => ErrorKind::Transient,
        }
    }

    /// Wraps a rusqlite error with the statement context that produced it
    pub(crate) fn query(context: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> Self {
        let context = context.into();
        move |source| StoreError::Query { context, source }
    }

    /// Attach context to a bare database error; other variants pass through
    pub(crate) fn context(self, context: impl Into<String>) -> Self {
        match self {
            StoreError::Database(source) => StoreError::Query {
                context: context.into(),
                source,
            },
            other => other,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Module version not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Fetch of {module_path}@{version} exceeded {timeout:?}")]
    Timeout {
        module_path: String,
        version: String,
        timeout: Duration,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::NotFound(_) => ErrorKind::NotFound,
            FetchError::Store(e) => e.kind(),
            FetchError::Network(_) | FetchError::InvalidResponse(_) | FetchError::Timeout { .. } => {
                ErrorKind::Transient
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Task queue {queue} rejected task with status {status}")]
    Rejected { queue: String, status: u16 },

    #[error("Fetch queue is closed")]
    Closed,

    #[error("Invalid queue configuration: {0}")]
    Config(String),

    #[error("Exclusion check failed: {0}")]
    Exclusion(#[from] StoreError),
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::Config(_) => ErrorKind::Fatal,
            QueueError::Exclusion(e) => e.kind(),
            QueueError::Network(_) | QueueError::Rejected { .. } | QueueError::Closed => {
                ErrorKind::Transient
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Fatal
    }
}
