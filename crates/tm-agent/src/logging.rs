//! Logging setup for the `tailmark` binary.
//!
//! Everything goes to stderr, so the only thing a scheduled run prints by
//! default is warnings worth mailing to the admin.

use tracing_subscriber::EnvFilter;

/// Filter directive for a verbosity level: warn, `-v` info, `-vv` debug, `--debug` trace.
pub fn level_for(verbosity: u8, debug: bool) -> &'static str {
    match (debug, verbosity) {
        (true, _) => "trace",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    }
}

/// Initialize logging. `RUST_LOG` takes precedence over the verbosity flags.
pub fn init(verbosity: u8, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity, debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}

/// Initialize logging for tests (captured by the test harness).
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
