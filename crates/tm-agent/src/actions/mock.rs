//! Mock action for testing: records every call instead of acting on it.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{Action, ActionData, ActionError, ActionResult};

/// One recorded [`Action::run`] invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub data: ActionData,
    pub dry_run: bool,
}

impl RecordedCall {
    /// Names of the logs passed in this call, sorted.
    pub fn logs(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }
}

/// An action that remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingAction {
    calls: Mutex<Vec<RecordedCall>>,
    failure: Option<String>,
}

impl RecordingAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls, then fail each of them with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Action for RecordingAction {
    fn kind(&self) -> &str {
        "recording"
    }

    async fn run(&self, data: &ActionData, dry_run: bool) -> ActionResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                data: data.clone(),
                dry_run,
            });
        match &self.failure {
            Some(message) => Err(ActionError::Failed(message.clone())),
            None => Ok(()),
        }
    }
}
