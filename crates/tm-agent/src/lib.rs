//! tailmark agent: configuration, processing pipeline and actions.
//!
//! One run loads the TOML configuration, tails every configured file with
//! `tm-tail`, classifies the new lines with `tm-classify` and hands whatever is
//! left to the configured actions. The `tailmark` binary wires these together
//! and is meant to be started periodically by a scheduler.

pub mod actions;
pub mod config;
pub mod logging;
pub mod pipeline;

// Re-export key types for convenience
pub use actions::{Action, ActionData, ActionError, ActionResult, DispatchSummary, run_actions};
pub use config::{Config, ConfigError, LogConfig};
pub use pipeline::{process_log, process_logs};
