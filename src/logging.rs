//! Logging setup for processes that host peas.
//!
//! The crate only emits `tracing` events; installing a subscriber is left to the
//! binary. [`init_logging`] is the default setup:
//! - console output with the pea span (`pea{name=.. identity=..}`) on every line
//! - configurable via `RUST_LOG`
//! - `PEA_LOG_CONFIG=QUIET` (set for quiet isolated peas) lowers the default to `warn`

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::core::ENV_LOG_CONFIG;

/// Default directive when neither `RUST_LOG` nor quiet mode says otherwise.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Directive used when `PEA_LOG_CONFIG=QUIET`.
pub const QUIET_DIRECTIVE: &str = "warn";

/// Installs the global subscriber.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(default_directive: &str) -> Result<(), TryInitError> {
    let quiet = std::env::var(ENV_LOG_CONFIG).ok();
    let directive = effective_directive(default_directive, quiet.as_deref());

    // Defaults to `directive` if RUST_LOG is not set
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()
}

fn effective_directive<'a>(default_directive: &'a str, log_config: Option<&str>) -> &'a str {
    match log_config {
        Some(v) if v.eq_ignore_ascii_case("QUIET") => QUIET_DIRECTIVE,
        _ => default_directive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_lowers_default() {
        assert_eq!(effective_directive("debug", Some("QUIET")), QUIET_DIRECTIVE);
        assert_eq!(effective_directive("debug", Some("quiet")), QUIET_DIRECTIVE);
        assert_eq!(effective_directive("debug", Some("LOUD")), "debug");
        assert_eq!(effective_directive(DEFAULT_DIRECTIVE, None), "info");
    }

    #[test]
    fn second_init_is_rejected() {
        // Whichever test installs first wins; the second call must fail, not panic.
        let _ = init_logging(DEFAULT_DIRECTIVE);
        assert!(init_logging(DEFAULT_DIRECTIVE).is_err());
    }
}
