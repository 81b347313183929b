//! Argument-free server binary (SPEC_FULL.md §6): all tuning is
//! environment-variable driven through `mm_core::config::Config`, per the
//! non-goal of a CLI argument parser. Exits with status 1 on a schema-load
//! or listener-bind failure; exits 0 on SIGINT/SIGTERM.

use mm_core::config::Config;
use tracing::{error, info};

#[tokio::main]
async fn main() {
  let config = Config::from_env();
  mm_core::logging::init(config.log_level, config.log_format);

  tokio::select! {
    result = mm_core::server::run(config) => {
      if let Err(e) = result {
        error!(event = "server_fatal_error", error = %e, "server exiting due to a fatal error");
        std::process::exit(1);
      }
    }
    _ = shutdown_signal() => {
      info!(event = "server_shutdown_signal", "received shutdown signal, exiting");
    }
  }
}

#[cfg(unix)]
async fn shutdown_signal() {
  use tokio::signal::unix::{SignalKind, signal};

  let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
  let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
  tokio::select! {
    _ = sigint.recv() => {}
    _ = sigterm.recv() => {}
  }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
  let _ = tokio::signal::ctrl_c().await;
}
