//! Tracing subscriber setup for the `dccs` binary.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "warn,dccs=info,dccs_engine=info,dccs_runner=info";
const VERBOSE_DIRECTIVES: &str = "warn,dccs=debug,dccs_engine=debug,dccs_runner=debug";

/// Filter from `RUST_LOG`, else the crate defaults (`debug` when `verbose`).
pub fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { VERBOSE_DIRECTIVES } else { DEFAULT_DIRECTIVES };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber. Logs go to stderr so stdout stays parseable.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
