//! Per-log line classifier.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::pattern::Pattern;
use crate::types::{ClassifiedLine, ClassifyStats, LogResults, ParsedLine};

/// Messages matching any of `messages` are ignored for sources matching `source`.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pub source: Pattern,
    pub messages: Vec<Pattern>,
}

impl IgnoreRule {
    pub fn new(source: Pattern, messages: Vec<Pattern>) -> Self {
        Self { source, messages }
    }

    pub fn matches(&self, parsed: &ParsedLine) -> bool {
        self.source.test(&parsed.source) && self.messages.iter().any(|p| p.test(&parsed.message))
    }
}

/// Outcome for a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Matched a garbage pattern before parsing.
    Garbage,
    /// None of the regexes matched.
    Unparsable,
    /// Parsed, but an ignore rule matched.
    Ignored(ParsedLine),
    /// Parsed and not ignored: worth reporting.
    Noteworthy(ParsedLine),
}

/// Sorts the lines of one log into [`Classification`]s.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    regexps: Vec<Regex>,
    garbage: Vec<Pattern>,
    ignore: Vec<IgnoreRule>,
}

impl Classifier {
    /// Lines are parsed with the first of `regexps` that matches.
    pub fn new(regexps: Vec<Regex>) -> Self {
        Self {
            regexps,
            ..Self::default()
        }
    }

    pub fn with_garbage(mut self, garbage: Vec<Pattern>) -> Self {
        self.garbage = garbage;
        self
    }

    pub fn with_ignore(mut self, ignore: Vec<IgnoreRule>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn garbage(&self) -> &[Pattern] {
        &self.garbage
    }

    pub fn ignore(&self) -> &[IgnoreRule] {
        &self.ignore
    }

    /// Extract named groups using the first regex that matches at the start of `line`.
    pub fn parse(&self, line: &str) -> Option<ParsedLine> {
        self.regexps.iter().find_map(|re| {
            let caps = re.captures(line)?;
            // leftmost-first: a match starting at 0 is found if one exists
            if caps.get(0).is_none_or(|m| m.start() != 0) {
                return None;
            }
            let mut parsed = ParsedLine::default();
            for name in re.capture_names().flatten() {
                let Some(value) = caps.name(name) else {
                    continue;
                };
                match name {
                    "source" => parsed.source = value.as_str().to_string(),
                    "message" => parsed.message = value.as_str().to_string(),
                    other => {
                        parsed
                            .fields
                            .insert(other.to_string(), value.as_str().to_string());
                    }
                }
            }
            Some(parsed)
        })
    }

    pub fn classify(&self, line: &str) -> Classification {
        if self.garbage.iter().any(|p| p.test(line)) {
            return Classification::Garbage;
        }
        let Some(parsed) = self.parse(line) else {
            return Classification::Unparsable;
        };
        if self.ignore.iter().any(|rule| rule.matches(&parsed)) {
            Classification::Ignored(parsed)
        } else {
            Classification::Noteworthy(parsed)
        }
    }

    /// Classify every line of the log called `name`.
    pub fn process<I>(&self, name: &str, lines: I) -> LogResults
    where
        I: IntoIterator<Item = String>,
    {
        let mut results = LogResults::default();
        for line in lines {
            match self.classify(&line) {
                Classification::Garbage => {
                    results.stats.garbage += 1;
                    debug!(log = name, "garbage: {line}");
                }
                Classification::Unparsable => {
                    results.stats.invalid += 1;
                    warn!("[{name}] Could not parse: {line}");
                    results.unparsable.push(line);
                }
                Classification::Ignored(_) => {
                    results.stats.ignored += 1;
                    debug!(log = name, "ignored: {line}");
                }
                Classification::Noteworthy(parsed) => {
                    results.stats.other += 1;
                    debug!(log = name, "{line}");
                    results.lines.push(ClassifiedLine { raw: line, parsed });
                }
            }
        }
        info!(log = name, "Stats: {}", results.stats);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_classifier() -> Classifier {
        let re = Regex::new(r"^(?P<source>[^/]+)/(?P<message>.+)$").unwrap();
        Classifier::new(vec![re])
            .with_garbage(vec![Pattern::parse("crap").unwrap()])
            .with_ignore(vec![
                IgnoreRule::new(
                    Pattern::parse("foo").unwrap(),
                    vec![Pattern::parse("boring").unwrap()],
                ),
                IgnoreRule::new(
                    Pattern::parse("bar").unwrap(),
                    vec![Pattern::parse("zzz").unwrap()],
                ),
            ])
    }

    #[test]
    fn process_sorts_lines() {
        let lines = [
            "crap", "foo/zzz", "foo/123", "foo/boring", "bar/boring", "bar/456", "bar/zzz", "wtf",
        ]
        .map(String::from);
        let results = sample_classifier().process("test", lines);

        let raw: Vec<_> = results.lines.iter().map(|l| l.raw.as_str()).collect();
        assert_eq!(raw, vec!["foo/zzz", "foo/123", "bar/boring", "bar/456"]);
        assert_eq!(results.lines[1].parsed.source, "foo");
        assert_eq!(results.lines[1].parsed.message, "123");
        assert_eq!(results.unparsable, vec!["wtf"]);
        assert_eq!(
            results.stats,
            ClassifyStats {
                garbage: 1,
                invalid: 1,
                ignored: 2,
                other: 4
            }
        );
    }

    #[test]
    fn first_matching_regex_wins() {
        let classifier = Classifier::new(vec![
            Regex::new(r"^(?P<source>a)(?P<message>.*)$").unwrap(),
            Regex::new(r"^(?P<source>.)(?P<message>.*)(?P<extra>!)$").unwrap(),
        ]);
        let first = classifier.parse("abc!").unwrap();
        assert_eq!(first.source, "a");
        assert!(first.fields.is_empty());

        let second = classifier.parse("xyz!").unwrap();
        assert_eq!(second.source, "x");
        assert_eq!(second.fields.get("extra").map(String::as_str), Some("!"));
        assert!(classifier.parse("").is_none());
    }

    #[test]
    fn regexes_match_from_line_start() {
        let classifier = Classifier::new(vec![
            Regex::new(r"(?P<source>\w+): (?P<message>.*)").unwrap(),
        ]);
        assert!(classifier.parse("sshd: hello").is_some());
        assert!(classifier.parse(" - sshd: hello").is_none());
    }

    #[test]
    fn any_source_rule() {
        let classifier = Classifier::new(vec![
            Regex::new(r"^(?P<source>\w+): (?P<message>.*)$").unwrap(),
        ])
        .with_ignore(vec![IgnoreRule::new(
            Pattern::any(),
            vec![Pattern::parse("session opened*").unwrap()],
        )]);
        assert!(matches!(
            classifier.classify("sshd: session opened for root"),
            Classification::Ignored(_)
        ));
        assert!(matches!(
            classifier.classify("sshd: Failed password"),
            Classification::Noteworthy(_)
        ));
    }

    #[test]
    fn empty_results() {
        let results = sample_classifier().process("test", Vec::new());
        assert!(results.is_empty());
        assert_eq!(results.stats, ClassifyStats::default());
    }
}
