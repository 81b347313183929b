//! Structured logging setup (SPEC_FULL.md §11). Every lifecycle transition
//! logs through `tracing` with an `event = "<name>"` field plus structured
//! context, never free-form `println!`.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LogLevel};

/// Install the global `tracing` subscriber. Idempotent in practice: a second
/// call will fail to install and is silently ignored, matching the daemon's
/// single-process lifetime.
pub fn init(level: LogLevel, format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str(level)));

  let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

  let result = match format {
    LogFormat::Pretty => builder.try_init(),
    LogFormat::Json => builder.json().try_init(),
  };

  if result.is_err() {
    tracing::debug!(event = "logging_already_initialized", "tracing subscriber was already installed");
  }
}

fn filter_str(level: LogLevel) -> &'static str {
  match level {
    LogLevel::Off => "off",
    LogLevel::Warn => "warn",
    LogLevel::Info => "info",
    LogLevel::Debug => "debug",
    LogLevel::Trace => "trace",
  }
}
