//! tailmark: checks the new entries of log files and reports the unusual ones.
//!
//! Meant to run from cron or a systemd timer: every run only looks at what
//! was appended (or rotated away) since the previous one.

use std::path::PathBuf;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};

use tm_agent::config::{Config, DEFAULT_CONFIG_PATH, MAX_VERBOSITY};
use tm_agent::{logging, process_logs, run_actions};
use tm_tail::Tailer;

#[derive(Debug, Parser)]
#[command(name = "tailmark")]
#[command(version)]
#[command(about = "Check new log file entries and act on the unusual ones")]
struct Cli {
    /// The path to the config file
    #[arg(short, long, env = "TAILMARK_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Perform a dry run (no offset files are written, no actions executed)
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// More verbose output; can be given up to 2 times
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Enable debug output (very spammy); implies -vv
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose > MAX_VERBOSITY {
        Cli::command()
            .error(
                ErrorKind::ValueValidation,
                format!("-v can be given at most {MAX_VERBOSITY} times"),
            )
            .exit();
    }

    let mut config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Could not load config file");
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    config.apply_cli(cli.verbose, cli.debug);
    logging::init(config.verbosity, config.debug);

    for warning in &config.warnings {
        tracing::warn!("{warning}");
    }
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        logs = config.logs.len(),
        actions = config.actions.len(),
        dry_run = cli.dry_run,
        "config loaded"
    );

    // ── Tail and classify (blocking file I/O) ───────────────────
    let config = Arc::new(config);
    let tailer = Tailer::new().dry_run(cli.dry_run);
    let results = tokio::task::spawn_blocking({
        let config = Arc::clone(&config);
        move || process_logs(&config, &tailer, None)
    })
    .await?;

    // ── Actions ─────────────────────────────────────────────────
    let summary = run_actions(&config, &results, cli.dry_run).await;
    if !summary.is_success() {
        let failed: Vec<&str> = summary.failed.iter().map(|(name, _)| name.as_str()).collect();
        anyhow::bail!("actions failed: {}", failed.join(", "));
    }
    Ok(())
}
