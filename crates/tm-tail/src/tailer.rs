//! The tailer: yields the lines appended to a log file since the last run.
//!
//! One [`LogTail`] covers one file for one run:
//!
//! ```text
//! open live file ──fail or not a regular file──▶ NoSuchFile (warn, no lines, no commit)
//!      │
//!  read marker ──none──────────────▶ NewFile      read live from 0
//!      │ same identity ─ offset == size ▶ AtEof   nothing to do
//!      │               ─ offset >  size ▶ SameFile(0), warn "shrunk"
//!      │               ─ otherwise      ▶ SameFile(offset)
//!      │ other identity ───────────▶ RotatedFile  predecessor tail, then live from 0
//!      ▼
//!  drain lines ──▶ commit {live identity, live position} unless dry run
//! ```
//!
//! The live file is read up to the size observed when it was opened. Bytes
//! appended while the run is in progress are picked up by the next run.
//! The marker is only written once the consumer has drained every line, so a
//! run that dies half-way redelivers instead of dropping.

use std::fs::{File, Metadata};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::decode::LineReader;
use crate::error::TailWarning;
use crate::identity::FileIdentity;
use crate::offset::{OffsetMarker, OffsetStore};
use crate::rotation::RotationResolver;

/// Where a tail started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailState {
    /// The live file could not be opened.
    NoSuchFile,
    /// Marker already points at the end of the file.
    AtEof,
    /// No usable marker, reading from the start.
    NewFile,
    /// Same file as last time, reading from `offset`.
    SameFile { offset: u64 },
    /// The file was replaced; `predecessor` is the confirmed rotated file, if any.
    RotatedFile { predecessor: Option<PathBuf> },
}

/// Opens [`LogTail`]s with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Tailer {
    dry_run: bool,
    offset_dir: Option<PathBuf>,
}

impl Tailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// In dry-run mode no marker file is ever created or modified.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Keep markers in `dir` instead of next to each log file.
    pub fn offset_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.offset_dir = dir;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// The marker store used for `path`.
    pub fn store_for(&self, path: &Path) -> OffsetStore {
        match &self.offset_dir {
            Some(dir) => OffsetStore::in_dir(dir, path),
            None => OffsetStore::beside(path),
        }
    }

    pub fn tail(&self, path: impl AsRef<Path>) -> LogTail {
        let path = path.as_ref();
        self.tail_with_store(path, self.store_for(path))
    }

    /// Tail `path` using an explicit marker store.
    pub fn tail_with_store(&self, path: impl AsRef<Path>, store: OffsetStore) -> LogTail {
        LogTail::open(path.as_ref().to_path_buf(), store, self.dry_run)
    }
}

struct LiveSource {
    reader: LineReader<Box<dyn BufRead + Send>>,
    identity: FileIdentity,
    start: u64,
}

/// Lazy, single-pass sequence of new lines from one log file.
///
/// Iterating to the end commits the new offset marker (unless dry run).
/// Dropping it earlier commits nothing.
pub struct LogTail {
    path: PathBuf,
    store: OffsetStore,
    dry_run: bool,
    state: TailState,
    rotated: Option<(PathBuf, LineReader<BufReader<File>>)>,
    live: Option<LiveSource>,
    warnings: Vec<TailWarning>,
    lines_read: usize,
    committed: Option<OffsetMarker>,
    finished: bool,
}

/// Fully drained result of a [`LogTail`].
#[derive(Debug)]
pub struct TailReport {
    pub path: PathBuf,
    pub state: TailState,
    pub lines: Vec<String>,
    pub warnings: Vec<TailWarning>,
    pub committed: Option<OffsetMarker>,
}

impl LogTail {
    fn open(path: PathBuf, store: OffsetStore, dry_run: bool) -> Self {
        let mut tail = Self {
            path,
            store,
            dry_run,
            state: TailState::NoSuchFile,
            rotated: None,
            live: None,
            warnings: Vec::new(),
            lines_read: 0,
            committed: None,
            finished: false,
        };

        let (file, meta) = match open_with_metadata(&tail.path) {
            Ok(opened) => opened,
            Err(e) => {
                let warning = TailWarning::Unreadable {
                    path: tail.path.clone(),
                    error: e.to_string(),
                };
                tail.warn(warning);
                tail.finished = true;
                return tail;
            }
        };
        let identity = FileIdentity::from_metadata(&meta);
        let size = meta.len();
        debug!(path = %tail.path.display(), %identity, size, "live file opened");

        let start = match tail.store.read() {
            None => {
                tail.state = TailState::NewFile;
                0
            }
            Some(marker) if marker.identity == identity => {
                if marker.offset == size {
                    debug!(path = %tail.path.display(), "offset points to end of file");
                    tail.state = TailState::AtEof;
                    tail.finished = true;
                    return tail;
                }
                let offset = if marker.offset > size {
                    let warning = TailWarning::Shrunk {
                        path: tail.path.clone(),
                        size,
                        offset: marker.offset,
                    };
                    tail.warn(warning);
                    0
                } else {
                    marker.offset
                };
                tail.state = TailState::SameFile { offset };
                offset
            }
            Some(marker) => {
                debug!(
                    path = %tail.path.display(),
                    recorded = %marker.identity,
                    current = %identity,
                    "identity changed, checking for rotated file"
                );
                let predecessor = RotationResolver::new(&tail.path).resolve(marker.identity);
                if let Some(rotated_path) = &predecessor {
                    match open_at(rotated_path, marker.offset) {
                        Ok(reader) => {
                            debug!(
                                rotated = %rotated_path.display(),
                                offset = marker.offset,
                                "reading rotated file tail"
                            );
                            tail.rotated = Some((rotated_path.clone(), LineReader::new(reader)));
                        }
                        Err(e) => {
                            let warning = TailWarning::RotatedUnreadable {
                                path: rotated_path.clone(),
                                error: e.to_string(),
                            };
                            tail.warn(warning);
                        }
                    }
                }
                tail.state = TailState::RotatedFile { predecessor };
                0
            }
        };

        match seek_reader(file, start) {
            Ok(reader) => {
                let bounded: Box<dyn BufRead + Send> = Box::new(reader.take(size - start));
                tail.live = Some(LiveSource {
                    reader: LineReader::new(bounded),
                    identity,
                    start,
                });
            }
            Err(e) => {
                let warning = TailWarning::Unreadable {
                    path: tail.path.clone(),
                    error: e.to_string(),
                };
                tail.warn(warning);
            }
        }
        tail
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &TailState {
        &self.state
    }

    pub fn warnings(&self) -> &[TailWarning] {
        &self.warnings
    }

    /// The marker written at the end of the run, once drained.
    pub fn committed(&self) -> Option<&OffsetMarker> {
        self.committed.as_ref()
    }

    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drain every line and return them along with the run's outcome.
    pub fn read_all(mut self) -> TailReport {
        let lines = self.by_ref().collect();
        TailReport {
            path: self.path,
            state: self.state,
            lines,
            warnings: self.warnings,
            committed: self.committed,
        }
    }

    fn warn(&mut self, warning: TailWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    fn next_rotated(&mut self) -> Option<String> {
        let (path, reader) = self.rotated.as_mut()?;
        if let Some(line) = reader.next() {
            return Some(line);
        }
        let failure = reader.take_error().map(|e| TailWarning::ReadFailed {
            path: path.clone(),
            error: e.to_string(),
        });
        self.rotated = None;
        if let Some(warning) = failure {
            self.warn(warning);
        }
        None
    }

    fn next_live(&mut self) -> Option<String> {
        let live = self.live.as_mut()?;
        if let Some(line) = live.reader.next() {
            return Some(line);
        }
        if let Some(e) = live.reader.take_error() {
            let warning = TailWarning::ReadFailed {
                path: self.path.clone(),
                error: e.to_string(),
            };
            self.warn(warning);
        }
        None
    }

    fn commit(&mut self) {
        self.finished = true;
        let Some(live) = self.live.take() else {
            return;
        };
        let position = live.start + live.reader.consumed();
        debug!(path = %self.path.display(), position, "reached end of log file");
        if self.dry_run {
            debug!(path = %self.store.path().display(), "dry run, not writing offset marker");
            return;
        }
        let marker = OffsetMarker::new(live.identity, position);
        match self.store.write(&marker) {
            None => self.committed = Some(marker),
            Some(warning) => self.warnings.push(warning),
        }
    }
}

impl Iterator for LogTail {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }
        match self.next_rotated().or_else(|| self.next_live()) {
            Some(line) => {
                self.lines_read += 1;
                Some(line)
            }
            None => {
                self.commit();
                None
            }
        }
    }
}

fn open_with_metadata(path: &Path) -> std::io::Result<(File, Metadata)> {
    let file = File::open(path)?;
    let meta = file.metadata()?;
    if !meta.is_file() {
        return Err(std::io::Error::other("not a regular file"));
    }
    Ok((file, meta))
}

fn seek_reader(mut file: File, offset: u64) -> std::io::Result<BufReader<File>> {
    file.seek(SeekFrom::Start(offset))?;
    Ok(BufReader::new(file))
}

fn open_at(path: &Path, offset: u64) -> std::io::Result<BufReader<File>> {
    seek_reader(File::open(path)?, offset)
}
