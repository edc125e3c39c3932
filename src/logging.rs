//! Logging setup.
//!
//! All output goes to **stderr**; stdout belongs to the host protocol.
//!
//! The filter is taken from `TEAMCITY_PROVIDER_LOG`, then `RUST_LOG`, then the
//! given default level. HTTP client internals are kept at `warn` by default
//! since request tracing is done by the provider itself.
//!
//! ```bash
//! RUST_LOG=debug ./provider
//! TEAMCITY_PROVIDER_LOG=hemmer_provider_teamcity::parameter=debug ./provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Provider-specific filter variable, checked before `RUST_LOG`.
pub const LOG_ENV: &str = "TEAMCITY_PROVIDER_LOG";

/// Initialize logging at `info` unless the environment says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(filter_from_env(default_level)).init();
}

/// Try to initialize logging, returning `false` if a subscriber was already set.
pub fn try_init_logging() -> bool {
    subscriber(filter_from_env("info")).try_init().is_ok()
}

fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

fn filter_from_env(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)))
}

fn default_directives(level: &str) -> String {
    format!("{},hyper=warn,reqwest=warn", level)
}
