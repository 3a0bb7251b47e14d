//! Logging initialization for tea.
//!
//! Configures `tracing-subscriber` from the `[general]` section of `TeaConfig`.
//! Diagnostics always go to stderr with ANSI disabled, since the real
//! stdout/stderr carry the child's relayed output.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tea_core::config::GeneralConfig;

use crate::error::CliError;

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Formats
///
/// * `"pretty"` - Multi-line human-readable output (default)
/// * `"compact"` - One line per event
/// * `"json"` - Machine-parseable JSON lines
pub fn init_tracing(config: &GeneralConfig) -> Result<(), CliError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);

    let result = match config.log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init(),
        "compact" => tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.compact())
            .try_init(),
        "pretty" => tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.pretty())
            .try_init(),
        other => {
            return Err(CliError::Logging(format!(
                "unknown log format '{other}', expected 'pretty', 'compact' or 'json'"
            )));
        }
    };

    result.map_err(|e| CliError::Logging(format!("failed to initialize tracing subscriber: {e}")))
}
