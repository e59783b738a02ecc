//! Tracing subscriber setup.

use std::io;

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=info";

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event, fields flattened.
    #[default]
    Json,
    /// Human-readable single-line output.
    Compact,
}

/// Installs the global subscriber writing to stdout.
///
/// Honors `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]. Only the
/// first call installs a subscriber.
pub fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = fmt().with_env_filter(filter).with_writer(io::stdout);

    let _ = match format {
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}
