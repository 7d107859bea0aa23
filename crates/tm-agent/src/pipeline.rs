//! One processing run: tail every file of every log and classify the lines.

use std::collections::BTreeMap;

use tm_classify::LogResults;
use tm_tail::Tailer;
use tracing::{info, warn};

use crate::config::{Config, LogConfig};

/// Process the logs called `names`, or every configured log if `None`.
///
/// Unknown names are skipped with a warning.
pub fn process_logs(
    config: &Config,
    tailer: &Tailer,
    names: Option<&[String]>,
) -> BTreeMap<String, LogResults> {
    let selected: Vec<&String> = match names {
        Some(names) => names.iter().collect(),
        None => config.logs.keys().collect(),
    };

    let mut results = BTreeMap::new();
    for name in selected {
        let Some(log) = config.logs.get(name) else {
            warn!(log = %name, "log is not configured");
            continue;
        };
        results.insert(name.clone(), process_log(name, log, tailer));
    }
    results
}

/// Tail all files of one log, in order, and classify what they yield.
///
/// Each file's offset marker is committed as soon as its lines have been
/// classified.
pub fn process_log(name: &str, log: &LogConfig, tailer: &Tailer) -> LogResults {
    let files: Vec<String> = log.files.iter().map(|f| f.display().to_string()).collect();
    info!("*** Processing log '{name}' ({})", files.join(", "));
    let garbage = log.classifier.garbage();
    if !garbage.is_empty() {
        info!("  Garbage patterns:");
        for pattern in garbage {
            info!("    - {pattern}");
        }
    }
    let ignore = log.classifier.ignore();
    if !ignore.is_empty() {
        info!("  Ignore patterns:");
        for rule in ignore {
            match rule.source.text() {
                None => info!("    - Any source"),
                Some(source) => info!("    - Source: {source}"),
            }
            for pattern in &rule.messages {
                info!("      - {pattern}");
            }
        }
    }

    let tailer = match &log.offset_dir {
        Some(dir) => tailer.clone().offset_dir(Some(dir.clone())),
        None => tailer.clone(),
    };
    let lines = log.files.iter().flat_map(|file| tailer.tail(file));
    log.classifier.process(name, lines)
}
