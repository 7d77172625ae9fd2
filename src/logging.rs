//! tracing setup for the binary

use tracing_subscriber::EnvFilter;

/// environment variable holding the log filter, e.g. `fieldlogic=debug`
pub const LOG_ENV_VAR: &str = "FIELDLOGIC_LOG";

/// filter from `--verbose`, else `FIELDLOGIC_LOG`, else warnings only
pub fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("fieldlogic=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// install the global subscriber; logs go to stderr so stdout stays parseable
pub fn init(verbose: bool) {
    // a subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init();
}
