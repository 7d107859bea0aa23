//! On-disk file identity.

use std::fmt;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Identifies the storage object behind a path (the inode number).
///
/// Two handles share an identity iff they point at the same file, whatever
/// path was used to open them. A rename keeps the identity, a copy does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity(u64);

impl FileIdentity {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn from_metadata(meta: &Metadata) -> Self {
        Self(meta.ino())
    }

    /// Stat `path` (following symlinks) and return its identity.
    pub fn of_path(path: &Path) -> std::io::Result<Self> {
        std::fs::metadata(path).map(|m| Self::from_metadata(&m))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
