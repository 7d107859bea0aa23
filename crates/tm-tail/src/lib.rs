//! Incremental log tailing for tailmark.
//!
//! Reads only the lines appended to a log file since the previous run,
//! surviving process restarts, rename rotation (`<log>.1`, `<log>-YYYYMMDD`),
//! copy-truncate rotation and corrupt state. Progress is persisted in a small
//! sidecar marker (`<log>.offset`) holding the file's inode and byte offset.
//!
//! Nothing in this crate aborts a run: every filesystem problem degrades to
//! "fewer lines this round" plus a [`TailWarning`].

#[cfg(not(unix))]
compile_error!("tm-tail identifies files by inode and only supports Unix platforms");

pub mod decode;
pub mod error;
pub mod identity;
pub mod offset;
pub mod rotation;
pub mod tailer;

// Re-export key types for convenience
pub use decode::LineReader;
pub use error::{TailError, TailResult, TailWarning};
pub use identity::FileIdentity;
pub use offset::{OffsetMarker, OffsetStore};
pub use rotation::RotationResolver;
pub use tailer::{LogTail, TailReport, TailState, Tailer};

/// `path` with `suffix` appended to its final component (`a.log` → `a.log.1`).
pub(crate) fn path_with_suffix(path: &std::path::Path, suffix: &str) -> std::path::PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    raw.into()
}
