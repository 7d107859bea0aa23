//! Rotation resolver: find where the previously tailed file went.
//!
//! When the live path now points at a different file, the old one has usually
//! been renamed by logrotate. Two naming schemes are recognised, in order:
//!
//! 1. numeric suffix: `<log>.1`
//! 2. date suffix: `<log>-YYYYMMDD`, the lexically greatest match
//!
//! A candidate is only accepted if its identity equals the one recorded in the
//! offset marker. That is what separates "the old file moved here" from "an
//! unrelated file that happens to match the naming scheme".

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::identity::FileIdentity;

const DATE_SUFFIX_GLOB: &str = "-[0-9][0-9][0-9][0-9][0-9][0-9][0-9][0-9]";

/// Locates the rotated predecessor of a log file.
#[derive(Debug, Clone)]
pub struct RotationResolver {
    path: PathBuf,
}

impl RotationResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Rotation candidates in priority order. Only existing regular files are listed.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut found = Vec::with_capacity(2);
        match self.numeric_candidate() {
            Some(p) => found.push(p),
            None => debug!(path = %self.path.display(), "no numeric-suffix rotation candidate"),
        }
        match self.dated_candidate() {
            Some(p) => found.push(p),
            None => debug!(path = %self.path.display(), "no date-suffix rotation candidate"),
        }
        found
    }

    /// The first candidate whose identity is `recorded`, if any.
    pub fn resolve(&self, recorded: FileIdentity) -> Option<PathBuf> {
        for candidate in self.candidates() {
            match FileIdentity::of_path(&candidate) {
                Ok(identity) if identity == recorded => {
                    debug!(candidate = %candidate.display(), %identity, "rotated file found");
                    return Some(candidate);
                }
                Ok(identity) => {
                    debug!(
                        candidate = %candidate.display(),
                        %identity,
                        %recorded,
                        "identity mismatch, discarding candidate"
                    );
                }
                Err(e) => {
                    debug!(candidate = %candidate.display(), error = %e, "cannot stat candidate");
                }
            }
        }
        None
    }

    fn numeric_candidate(&self) -> Option<PathBuf> {
        let candidate = crate::path_with_suffix(&self.path, ".1");
        candidate.is_file().then_some(candidate)
    }

    fn dated_candidate(&self) -> Option<PathBuf> {
        let base = self.path.to_str()?;
        let pattern = format!("{}{DATE_SUFFIX_GLOB}", glob::Pattern::escape(base));
        glob::glob(&pattern)
            .ok()?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .max()
    }
}

/// Convenience wrapper around [`RotationResolver::resolve`].
pub fn resolve_predecessor(path: &Path, recorded: FileIdentity) -> Option<PathBuf> {
    RotationResolver::new(path).resolve(recorded)
}
