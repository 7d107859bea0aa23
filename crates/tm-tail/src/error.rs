//! Tailing error and warning types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the fallible building blocks of the tailer.
///
/// These never escape [`crate::Tailer`]; it turns each of them into a
/// [`TailWarning`] and carries on.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed offset marker: {0}")]
    Marker(String),
}

impl TailError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for tailing results.
pub type TailResult<T> = Result<T, TailError>;

/// A soft failure observed while tailing one file.
///
/// Each warning is also emitted through `tracing` at the moment it happens.
#[derive(Debug, Error)]
pub enum TailWarning {
    #[error("could not read: {} ({error})", path.display())]
    Unreadable { path: PathBuf, error: String },

    #[error("could not read rotated file: {} ({error})", path.display())]
    RotatedUnreadable { path: PathBuf, error: String },

    #[error("file shrunk since last read: {} ({size} < {offset})", path.display())]
    Shrunk { path: PathBuf, size: u64, offset: u64 },

    #[error("read interrupted: {} ({error})", path.display())]
    ReadFailed { path: PathBuf, error: String },

    #[error("could not write: {} ({error})", path.display())]
    MarkerUnwritable { path: PathBuf, error: String },
}
