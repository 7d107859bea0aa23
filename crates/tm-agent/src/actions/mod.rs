//! Actions: what happens to the lines that survived classification.
//!
//! Every log names the actions its results go to. After all logs were
//! processed, [`run_actions`] groups the non-empty results per action and runs
//! each action exactly once with everything addressed to it.

pub mod mail;
pub mod mock;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tm_classify::LogResults;
use tracing::{debug, error, info};

use crate::config::{Config, ConfigError, ConfigResult};

pub use mail::MailAction;

/// Results handed to one action, keyed by log name.
pub type ActionData = BTreeMap<String, LogResults>;

pub type ActionResult<T> = Result<T, ActionError>;

/// Errors raised while running an action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not talk to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
    #[error("{program} failed ({status}): {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("could not build mail message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp delivery via {host} failed: {source}")]
    Smtp {
        host: String,
        #[source]
        source: lettre::transport::smtp::Error,
    },
    #[error("{0}")]
    Failed(String),
}

/// Something done with the noteworthy lines of one run.
///
/// Implementations must honour `dry_run`: prepare everything, but send,
/// write or execute nothing.
#[async_trait]
pub trait Action: Send + Sync + std::fmt::Debug {
    /// The configuration `type` this action was built from.
    fn kind(&self) -> &str;

    /// Handle the results of every log addressed to this action.
    async fn run(&self, data: &ActionData, dry_run: bool) -> ActionResult<()>;
}

/// Build an action from its `type` and the remaining settings of its table.
pub fn from_config(kind: &str, settings: &toml::Table) -> ConfigResult<Arc<dyn Action>> {
    match kind {
        mail::KIND => Ok(Arc::new(MailAction::from_settings(settings)?)),
        other => Err(ConfigError::Invalid(format!("type does not exist: {other}"))),
    }
}

/// Which actions ran during [`run_actions`], and which of them failed.
#[derive(Debug, Default)]
pub struct DispatchSummary {
    pub ran: Vec<String>,
    pub failed: Vec<(String, ActionError)>,
}

impl DispatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run every action that has something to report.
///
/// Logs without any noteworthy or unparsable lines are skipped. A failing
/// action is logged and recorded; the remaining actions still run.
pub async fn run_actions(
    config: &Config,
    results: &BTreeMap<String, LogResults>,
    dry_run: bool,
) -> DispatchSummary {
    let mut per_action: BTreeMap<&str, ActionData> = BTreeMap::new();
    for (name, log_results) in results {
        if log_results.is_empty() {
            continue;
        }
        let Some(log) = config.logs.get(name) else {
            continue;
        };
        for action in &log.actions {
            per_action
                .entry(action.as_str())
                .or_default()
                .insert(name.clone(), log_results.clone());
        }
    }

    let mut summary = DispatchSummary::default();
    for (name, data) in per_action {
        let Some(action) = config.actions.get(name) else {
            continue;
        };
        debug!(action = name, kind = action.kind(), logs = data.len(), "running action");
        match action.run(&data, dry_run).await {
            Ok(()) => {
                info!(action = name, "action finished");
                summary.ran.push(name.to_string());
            }
            Err(e) => {
                error!(action = name, error = %e, "action failed");
                summary.failed.push((name.to_string(), e));
            }
        }
    }
    summary
}
