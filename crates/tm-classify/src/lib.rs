//! Line classification for tailmark.
//!
//! Takes the raw lines produced by `tm-tail` and sorts them into garbage,
//! unparsable, ignored and noteworthy lines. Parsing uses named-group regexes
//! (`source`, `message`) with `%(name)` placeholder expansion; filtering uses
//! glob or `/regex/` patterns that may be negated with a leading `^`.

pub mod classifier;
pub mod error;
pub mod pattern;
pub mod placeholders;
pub mod regexps;
pub mod types;

// Re-export key types for convenience
pub use classifier::{Classification, Classifier, IgnoreRule};
pub use error::{ClassifyError, ClassifyResult};
pub use pattern::Pattern;
pub use placeholders::expand_placeholders;
pub use regexps::compile_regexps;
pub use types::{ClassifiedLine, ClassifyStats, LogResults, ParsedLine};
