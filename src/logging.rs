//! Logging setup for the provider.
//!
//! Logs go to **stderr** so stdout stays free for whatever protocol the host
//! speaks with the plugin process.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `pagerduty_provider=debug`)
//!
//! ```bash
//! # Trace every retry attempt and HTTP call
//! RUST_LOG=pagerduty_provider=debug ./my-host
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the default logging subscriber.
///
/// Respects `RUST_LOG` and falls back to `info` when it is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// Like [`init_logging`], but `default_level` is used when `RUST_LOG` is not
/// set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```ignore
/// use pagerduty_provider::init_logging_with_default;
///
/// fn main() {
///     init_logging_with_default("pagerduty_provider=debug");
///     tracing::info!("host starting");
/// }
/// ```
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this never panics, which makes it safe to call
/// from tests.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only
    // try_init_logging is exercised here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("pagerduty_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,pagerduty_provider::retry=debug").is_ok());
    }

    #[test]
    fn test_try_init_logging_is_idempotent() {
        try_init_logging();
        assert!(!try_init_logging());
        tracing::debug!("logging initialized");
    }
}
