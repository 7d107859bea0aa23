//! Shared test harness for E2E integration tests.
//!
//! Writes a real config file into a temp directory, loads it with
//! `Config::from_file` and swaps every configured action for a
//! `RecordingAction`, so runs exercise tailing, classification and dispatch
//! without sending mail.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use tm_agent::actions::mock::{RecordedCall, RecordingAction};
use tm_agent::{Action, Config, DispatchSummary, process_logs, run_actions};
use tm_classify::LogResults;
use tm_tail::Tailer;

const REGEXPS: &str = r#"
[regexps]
__word = '[\w.-]+'
plain = '^(?P<source>%(word)): (?P<message>.*)$'
"#;

/// End-to-end harness: temp directory, loaded config, recording actions.
pub struct TestHarness {
    dir: TempDir,
    pub config: Config,
    /// One recorder per configured action, by action name.
    pub recorders: BTreeMap<String, Arc<RecordingAction>>,
}

/// Outcome of one [`TestHarness::run`].
pub struct RunOutcome {
    pub results: BTreeMap<String, LogResults>,
    pub summary: DispatchSummary,
}

impl RunOutcome {
    /// Raw noteworthy lines of `log`, in delivery order.
    pub fn lines(&self, log: &str) -> Vec<String> {
        self.results
            .get(log)
            .map(|r| r.lines.iter().map(|l| l.raw.clone()).collect())
            .unwrap_or_default()
    }
}

impl TestHarness {
    /// Build a harness from the `[actions]` and `[logs]` part of a config.
    ///
    /// `{dir}` in `body` is replaced with the harness directory.
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let body = body.replace("{dir}", &dir.path().display().to_string());
        let config_path = dir.path().join("tailmark.toml");
        fs::write(&config_path, format!("{REGEXPS}\n{body}")).expect("failed to write config");

        let mut config = Config::from_file(&config_path).expect("config should load");
        let mut recorders = BTreeMap::new();
        for (name, action) in config.actions.iter_mut() {
            let recorder = Arc::new(RecordingAction::new());
            *action = Arc::clone(&recorder) as Arc<dyn Action>;
            recorders.insert(name.clone(), recorder);
        }

        Self {
            dir,
            config,
            recorders,
        }
    }

    /// A harness with one auto action (`report`) and one log (`app`) reading `app.log`.
    pub fn single_log() -> Self {
        Self::new(
            r#"
[actions.report]
type = "mail"
to = "admin@example.com"

[logs.app]
file = "{dir}/app.log"
regex = "plain"
garbage = "*-- MARK --*"
ignore = { cron = "*" }
"#,
        )
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) {
        fs::write(self.path(name), content).expect("failed to write file");
    }

    pub fn append(&self, name: &str, content: &str) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.path(name))
            .expect("failed to open file for append");
        file.write_all(content.as_bytes()).expect("failed to append");
    }

    pub fn rename(&self, from: &str, to: &str) {
        fs::rename(self.path(from), self.path(to)).expect("failed to rename");
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// One full tailmark run: tail and classify every log, then dispatch.
    pub async fn run(&self, dry_run: bool) -> RunOutcome {
        let tailer = Tailer::new().dry_run(dry_run);
        let results = process_logs(&self.config, &tailer, None);
        let summary = run_actions(&self.config, &results, dry_run).await;
        RunOutcome { results, summary }
    }

    pub fn calls(&self, action: &str) -> Vec<RecordedCall> {
        self.recorders
            .get(action)
            .map(|r| r.calls())
            .unwrap_or_default()
    }
}

pub fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
