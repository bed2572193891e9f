//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "DDESCRIBER_LOG";

/// Install the global subscriber. Output goes to stderr so command output stays parseable.
///
/// `verbose` raises the default level from `warn` to `debug`; an explicit `DDESCRIBER_LOG`
/// always wins.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second initialization (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
