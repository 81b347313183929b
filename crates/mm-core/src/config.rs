//! Startup configuration, resolved once from the environment and then passed
//! explicitly to every component that needs it (never re-read from
//! `std::env` deep in the call stack — see SPEC_FULL.md §10).

use std::path::{Path, PathBuf};

/// Log verbosity, mirrored onto a `tracing` `EnvFilter` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
  Off,
  Warn,
  Info,
  Debug,
  Trace,
}

impl LogLevel {
  fn as_filter_str(self) -> &'static str {
    match self {
      LogLevel::Off => "off",
      LogLevel::Warn => "warn",
      LogLevel::Info => "info",
      LogLevel::Debug => "debug",
      LogLevel::Trace => "trace",
    }
  }

  fn parse(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "off" => Some(LogLevel::Off),
      "warn" => Some(LogLevel::Warn),
      "info" => Some(LogLevel::Info),
      "debug" => Some(LogLevel::Debug),
      "trace" => Some(LogLevel::Trace),
      _ => None,
    }
  }
}

impl Default for LogLevel {
  fn default() -> Self {
    LogLevel::Info
  }
}

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
  #[default]
  Pretty,
  Json,
}

impl LogFormat {
  fn parse(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "pretty" => Some(LogFormat::Pretty),
      "json" => Some(LogFormat::Json),
      _ => None,
    }
  }
}

/// Immutable, process-wide configuration. Constructed once in `main` via
/// [`Config::from_env`] and cloned into whatever needs it.
#[derive(Debug, Clone)]
pub struct Config {
  pub socket_path: PathBuf,
  pub log_level: LogLevel,
  pub log_format: LogFormat,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      socket_path: PathBuf::from("/tmp/mm.sock"),
      log_level: LogLevel::default(),
      log_format: LogFormat::default(),
    }
  }
}

impl Config {
  /// Resolve configuration from `MM_SOCKET_PATH`, `MM_LOG_LEVEL`, and
  /// `MM_LOG_FORMAT`. Unset or unrecognized values fall back to defaults.
  pub fn from_env() -> Self {
    let mut cfg = Config::default();

    if let Ok(path) = std::env::var("MM_SOCKET_PATH")
      && !path.is_empty()
    {
      cfg.socket_path = PathBuf::from(path);
    }

    if let Ok(level) = std::env::var("MM_LOG_LEVEL")
      && let Some(parsed) = LogLevel::parse(&level)
    {
      cfg.log_level = parsed;
    }

    if let Ok(format) = std::env::var("MM_LOG_FORMAT")
      && let Some(parsed) = LogFormat::parse(&format)
    {
      cfg.log_format = parsed;
    }

    cfg
  }

  pub fn socket_path(&self) -> &Path {
    &self.socket_path
  }
}
