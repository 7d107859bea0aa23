//! Offset store: the persisted `(identity, offset)` marker of a log file.
//!
//! The marker lives in a sidecar file (`<log>.offset` unless overridden) with
//! exactly two lines, the inode number and the byte offset:
//!
//! ```text
//! 1835021
//! 4096
//! ```
//!
//! Both directions fail soft. A missing or corrupt marker reads as "no prior
//! state", and a marker that cannot be written leaves the old one in place.

use std::ffi::OsString;
use std::fs::{OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{TailError, TailResult, TailWarning};
use crate::identity::FileIdentity;

/// Suffix appended to a log path to locate its default marker file.
pub const OFFSET_SUFFIX: &str = ".offset";

const MARKER_MODE: u32 = 0o600;

/// Bytes `[0, offset)` of the file with `identity` have been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetMarker {
    pub identity: FileIdentity,
    pub offset: u64,
}

impl OffsetMarker {
    pub fn new(identity: FileIdentity, offset: u64) -> Self {
        Self { identity, offset }
    }

    /// Parse marker file content. Anything but two unsigned integer lines is rejected.
    pub fn parse(content: &str) -> TailResult<Self> {
        let mut lines = content.lines();
        let (Some(identity), Some(offset), None) = (lines.next(), lines.next(), lines.next())
        else {
            return Err(TailError::Marker(format!(
                "expected 2 lines, found {}",
                content.lines().count()
            )));
        };
        let identity = parse_field("identity", identity)?;
        let offset = parse_field("offset", offset)?;
        Ok(Self::new(FileIdentity::new(identity), offset))
    }

    pub fn render(&self) -> String {
        format!("{}\n{}\n", self.identity, self.offset)
    }
}

fn escape_path(path: &Path) -> OsString {
    let mut escaped = Vec::new();
    for &byte in path.as_os_str().as_bytes() {
        match byte {
            b'%' => escaped.extend_from_slice(b"%25"),
            b'/' => escaped.extend_from_slice(b"%2F"),
            other => escaped.push(other),
        }
    }
    OsString::from_vec(escaped)
}

fn parse_field(name: &str, raw: &str) -> TailResult<u64> {
    raw.trim()
        .parse()
        .map_err(|e| TailError::Marker(format!("{name} {raw:?}: {e}")))
}

/// Reads and writes the marker file of a single log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetStore {
    path: PathBuf,
}

impl OffsetStore {
    /// Store backed by an explicit marker path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default store for `log`: `<log>.offset`.
    pub fn beside(log: &Path) -> Self {
        Self::new(crate::path_with_suffix(log, OFFSET_SUFFIX))
    }

    /// Store for `log` kept in `dir`.
    ///
    /// The marker is named after the whole absolute log path with `%` and `/`
    /// percent-escaped, so `/var/log/auth.log` maps to
    /// `<dir>/%2Fvar%2Flog%2Fauth.log.offset`. Logs sharing a file name in
    /// different directories get distinct markers.
    pub fn in_dir(dir: &Path, log: &Path) -> Self {
        let absolute = std::path::absolute(log).unwrap_or_else(|_| log.to_path_buf());
        let mut name = escape_path(&absolute);
        name.push(OFFSET_SUFFIX);
        Self::new(dir.join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the marker, distinguishing "no marker" (`Ok(None)`) from failures.
    pub fn load(&self) -> TailResult<Option<OffsetMarker>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(TailError::Marker("not valid UTF-8".into()));
            }
            Err(e) => return Err(TailError::io(&self.path, e)),
        };
        OffsetMarker::parse(&content).map(Some)
    }

    /// Soft read: any failure is logged and reported as "no prior state".
    pub fn read(&self) -> Option<OffsetMarker> {
        match self.load() {
            Ok(Some(marker)) => {
                debug!(
                    path = %self.path.display(),
                    identity = %marker.identity,
                    offset = marker.offset,
                    "offset marker loaded"
                );
                Some(marker)
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no offset marker");
                None
            }
            Err(e @ TailError::Marker(_)) => {
                debug!(path = %self.path.display(), error = %e, "ignoring offset marker");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "offset marker unreadable, starting over");
                None
            }
        }
    }

    /// Replace the marker on disk.
    ///
    /// The content goes to a temporary sibling first and is renamed over the
    /// marker, so a failure at any step leaves the previous marker intact.
    pub fn store(&self, marker: &OffsetMarker) -> TailResult<()> {
        let io_err = |e| TailError::io(&self.path, e);

        // A read-only marker counts as unwritable instead of being replaced by the rename.
        match OpenOptions::new().write(true).open(&self.path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(e)),
        }

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".tailmark-offset")
            .tempfile_in(dir)
            .map_err(io_err)?;
        tmp.as_file()
            .set_permissions(Permissions::from_mode(MARKER_MODE))
            .map_err(io_err)?;
        tmp.write_all(marker.render().as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// Soft write: a failure is logged and returned as a warning.
    pub fn write(&self, marker: &OffsetMarker) -> Option<TailWarning> {
        match self.store(marker) {
            Ok(()) => {
                debug!(
                    path = %self.path.display(),
                    identity = %marker.identity,
                    offset = marker.offset,
                    "offset marker written"
                );
                None
            }
            Err(e) => {
                let warning = TailWarning::MarkerUnwritable {
                    path: self.path.clone(),
                    error: match e {
                        TailError::Io { source, .. } => source.to_string(),
                        other => other.to_string(),
                    },
                };
                warn!("{warning}");
                Some(warning)
            }
        }
    }
}
