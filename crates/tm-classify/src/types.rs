//! Classification result types.

use std::collections::BTreeMap;

/// Named groups extracted from a line by one of the log's regexes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedLine {
    /// The `source` group (program, facility, host, ...).
    pub source: String,
    /// The `message` group.
    pub message: String,
    /// Every other named group that participated in the match.
    pub fields: BTreeMap<String, String>,
}

/// A noteworthy line together with what was parsed out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub raw: String,
    pub parsed: ParsedLine,
}

/// Per-category line counts for one log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassifyStats {
    pub garbage: usize,
    pub invalid: usize,
    pub ignored: usize,
    pub other: usize,
}

impl std::fmt::Display for ClassifyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} garbage / {} invalid / {} ignored / {} other",
            self.garbage, self.invalid, self.ignored, self.other
        )
    }
}

/// What one log produced in one run: the lines actions should hear about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogResults {
    /// Parsed lines that were neither garbage nor ignored, in read order.
    pub lines: Vec<ClassifiedLine>,
    /// Raw lines none of the log's regexes could parse.
    pub unparsable: Vec<String>,
    pub stats: ClassifyStats,
}

impl LogResults {
    /// True if there is nothing to report.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.unparsable.is_empty()
    }
}
