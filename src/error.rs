use std::path::PathBuf;

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Executor capacity must be at least 1")]
    ZeroCapacity,
}

#[derive(Debug, Error)]
pub enum HashError {
    #[error("Couldn't list directory '{path}'.\n{source}")]
    ReadDir {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't stat '{path}'.\n{source}")]
    Stat {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't read file '{path}'.\n{source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Path '{}' is not valid UTF-8", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Couldn't serialize directory listing.\n{0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Hashing task failed.\n{0}")]
    Join(#[from] tokio::task::JoinError),
}

impl HashError {
    /// Returns the underlying I/O error kind, if this error came from the
    /// file system.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::ReadDir { source, .. }
            | Self::Stat { source, .. }
            | Self::Read { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid glob pattern '{pattern}'.\n{source}")]
pub struct FilterError {
    pattern: String,
    source: glob::PatternError,
}

impl FilterError {
    pub(crate) fn new(pattern: impl Into<String>, source: glob::PatternError) -> Self {
        Self {
            pattern: pattern.into(),
            source,
        }
    }
}
