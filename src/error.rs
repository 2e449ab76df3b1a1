use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the indexing, caching and resolving stages.
///
/// Only `CorruptCache` and `Config` are meant to end a run. The others are
/// collected per file and reported alongside the results.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache file '{}' is corrupt: {reason}", path.display())]
    CorruptCache { path: PathBuf, reason: String },

    #[error("permission denied deleting '{}'", .0.display())]
    PermissionDenied(PathBuf),

    #[error("failed to walk '{}': {reason}", path.display())]
    Walk { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::CorruptCache {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// The file this error is about, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::Io { path, .. }
            | Error::CorruptCache { path, .. }
            | Error::Walk { path, .. }
            | Error::PermissionDenied(path) => Some(path),
            Error::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes.
///
/// Per-file errors never change the exit code; they are logged as warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    CorruptCache = 2,
    Interrupted = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Maps a fatal error from the run to the exit code it should produce.
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<Error>() {
            Some(Error::CorruptCache { .. }) => ExitCode::CorruptCache,
            _ => ExitCode::GeneralError,
        }
    }
}
