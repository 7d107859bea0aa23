//! tailmark configuration, loaded from TOML.
//!
//! The file is deserialized into loosely-typed raw structs first and then
//! validated into [`Config`]: regexes compiled, patterns parsed, file lists
//! merged and every action reference resolved.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tm_classify::{Classifier, ClassifyError, IgnoreRule, Pattern, compile_regexps};

use crate::actions::{self, Action};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/tailmark.toml";

pub const MAX_VERBOSITY: u8 = 2;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("toml parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("verbosity must be in range 0..2")]
    Verbosity,
    #[error("required section missing: {0}")]
    MissingSection(&'static str),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("invalid action definition ({name}): {reason}")]
    Action { name: String, reason: String },
    #[error("invalid log definition ({name}): {reason}")]
    Log { name: String, reason: String },
    #[error("{0}")]
    Invalid(String),
}

/// A single value or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// Merge optional string-or-list fields, dropping empty strings.
fn merge_strings<'a>(fields: impl IntoIterator<Item = &'a Option<OneOrMany<String>>>) -> Vec<String> {
    fields
        .into_iter()
        .flatten()
        .flat_map(|field| field.clone().into_vec())
        .filter(|value| !value.is_empty())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum IgnoreSpec {
    Patterns(OneOrMany<String>),
    BySource(BTreeMap<String, OneOrMany<String>>),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    verbosity: Option<toml::Value>,
    debug: Option<toml::Value>,
    regexps: Option<BTreeMap<String, String>>,
    actions: Option<BTreeMap<String, RawAction>>,
    logs: Option<BTreeMap<String, RawLog>>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default = "default_auto")]
    auto: bool,
    #[serde(flatten)]
    settings: toml::Table,
}

fn default_auto() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawLog {
    file: Option<OneOrMany<String>>,
    files: Option<OneOrMany<String>>,
    regex: Option<OneOrMany<String>>,
    garbage: Option<OneOrMany<String>>,
    ignore: Option<IgnoreSpec>,
    action: Option<OneOrMany<String>>,
    actions: Option<OneOrMany<String>>,
    offset_dir: Option<PathBuf>,
}

/// Validated settings of one `[logs.<name>]` table.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Files to tail, sorted and de-duplicated.
    pub files: Vec<PathBuf>,
    /// Names of the regexes lines are parsed with, in the configured order.
    pub regexps: Vec<String>,
    pub classifier: Classifier,
    /// Actions receiving this log's results, sorted.
    pub actions: Vec<String>,
    /// Directory for offset markers instead of next to each file.
    pub offset_dir: Option<PathBuf>,
}

/// Validated tailmark configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub verbosity: u8,
    pub debug: bool,
    pub logs: BTreeMap<String, LogConfig>,
    pub actions: BTreeMap<String, Arc<dyn Action>>,
    /// Non-fatal problems found while loading, to be reported once logging is up.
    pub warnings: Vec<String>,
}

impl Config {
    /// Load config from a TOML file path.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let raw: RawConfig = toml::from_str(contents)?;
        Self::from_raw(raw)
    }

    /// Apply command line overrides. A CLI verbosity of 0 keeps the configured one.
    pub fn apply_cli(&mut self, verbosity: u8, debug: bool) {
        if verbosity > 0 {
            self.verbosity = verbosity.min(MAX_VERBOSITY);
        }
        self.debug |= debug;
        if self.debug {
            self.verbosity = MAX_VERBOSITY;
        }
    }

    fn from_raw(raw: RawConfig) -> ConfigResult<Self> {
        let mut config = Config::default();

        // typed loosely so a wrong type gets the same message as a bad number
        if let Some(verbosity) = raw.verbosity {
            config.verbosity = verbosity
                .as_integer()
                .and_then(|v| u8::try_from(v).ok())
                .filter(|v| *v <= MAX_VERBOSITY)
                .ok_or(ConfigError::Verbosity)?;
        }
        if let Some(debug) = raw.debug {
            config.debug = debug
                .as_bool()
                .ok_or_else(|| ConfigError::Invalid("debug must be true or false".into()))?;
        }
        if config.debug {
            config.verbosity = MAX_VERBOSITY;
        }

        let definitions = raw.regexps.ok_or(ConfigError::MissingSection("regexps"))?;
        let regexps = compile_regexps(&definitions)?;

        let mut auto_actions = BTreeSet::new();
        let raw_actions = raw.actions.ok_or(ConfigError::MissingSection("actions"))?;
        for (name, raw_action) in raw_actions {
            let Some(kind) = raw_action.kind else {
                return Err(ConfigError::Action {
                    name,
                    reason: "no type specified".into(),
                });
            };
            let action =
                actions::from_config(&kind, &raw_action.settings).map_err(|e| ConfigError::Action {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            if raw_action.auto {
                auto_actions.insert(name.clone());
            }
            config.actions.insert(name, action);
        }

        let raw_logs = raw.logs.ok_or(ConfigError::MissingSection("logs"))?;
        for (name, raw_log) in raw_logs {
            let log_error = |reason: String| ConfigError::Log {
                name: name.clone(),
                reason,
            };

            let files: BTreeSet<PathBuf> = merge_strings([&raw_log.file, &raw_log.files])
                .into_iter()
                .map(PathBuf::from)
                .collect();
            if files.is_empty() {
                return Err(log_error("no files specified".into()));
            }

            let regex_names = match raw_log.regex {
                Some(regex) => regex.into_vec(),
                None => vec![name.clone()],
            };
            let mut log_regexps = Vec::with_capacity(regex_names.len());
            for regex_name in &regex_names {
                let Some(regex) = regexps.get(regex_name) else {
                    return Err(log_error(format!("invalid regex specified: {regex_name}")));
                };
                log_regexps.push(regex.clone());
            }

            let garbage = parse_patterns(raw_log.garbage).map_err(|e| log_error(e.to_string()))?;
            let ignore = parse_ignore(raw_log.ignore).map_err(|e| log_error(e.to_string()))?;

            let log_actions: BTreeSet<String> = if raw_log.action.is_none() && raw_log.actions.is_none() {
                auto_actions.clone()
            } else {
                let named: BTreeSet<String> =
                    merge_strings([&raw_log.action, &raw_log.actions]).into_iter().collect();
                if let Some(unknown) = named.iter().find(|a| !config.actions.contains_key(*a)) {
                    return Err(log_error(format!("invalid action specified: {unknown}")));
                }
                named
            };
            if log_actions.is_empty() {
                config
                    .warnings
                    .push(format!("useless log definition ({name}): no actions defined"));
            }

            let log = LogConfig {
                files: files.into_iter().collect(),
                regexps: regex_names,
                classifier: Classifier::new(log_regexps)
                    .with_garbage(garbage)
                    .with_ignore(ignore),
                actions: log_actions.into_iter().collect(),
                offset_dir: raw_log.offset_dir,
            };
            config.logs.insert(name, log);
        }

        Ok(config)
    }
}

fn parse_patterns(value: Option<OneOrMany<String>>) -> Result<Vec<Pattern>, ClassifyError> {
    value
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| Pattern::parse(p))
        .collect()
}

fn parse_ignore(value: Option<IgnoreSpec>) -> Result<Vec<IgnoreRule>, ClassifyError> {
    match value {
        None => Ok(Vec::new()),
        Some(IgnoreSpec::Patterns(patterns)) => {
            let messages = parse_patterns(Some(patterns))?;
            if messages.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![IgnoreRule::new(Pattern::any(), messages)])
        }
        Some(IgnoreSpec::BySource(table)) => table
            .into_iter()
            .map(|(source, messages)| {
                Ok(IgnoreRule::new(
                    Pattern::parse(&source)?,
                    parse_patterns(Some(messages))?,
                ))
            })
            .collect(),
    }
}
