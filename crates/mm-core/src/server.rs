//! Top-level wiring: constructs the registries and shared channels
//! described in SPEC_FULL.md §2 and §9, spawns the inbound/outbound
//! dispatchers, and runs the acceptor loop. This is the one place that
//! assembles C2-C9 into a running server; `mm-server`'s `main` only adds
//! process-level bootstrap (config load, logging init, exit code).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::acceptor;
use crate::codec::SchemaTable;
use crate::config::Config;
use crate::connection::ConnectionRegistry;
use crate::control::ControlContext;
use crate::dispatch::{run_inbound, run_outbound};
use crate::error::ServerError;
use crate::process::ProcessRegistry;

/// How many `(connectionId, Record)` pairs may queue for the inbound
/// dispatcher before a decoder task blocks; how many `(processId, bytes)`
/// stdout chunks may queue for the outbound dispatcher before a
/// stdout-filler thread blocks.
const INBOUND_QUEUE_CAPACITY: usize = 256;
const STDOUT_QUEUE_CAPACITY: usize = 256;

/// Run the PTY multiplexer server until the listener fails. Schema-load and
/// listener-bind failures are server-fatal per SPEC_FULL.md §4.10/§7 and
/// are returned to the caller (`mm-server`'s `main`, which exits with
/// status 1); every other failure is contained to the connection or
/// process it occurred on.
pub async fn run(config: Config) -> Result<(), ServerError> {
  let _schema_table = SchemaTable::load()?;

  let process_registry = Arc::new(ProcessRegistry::new());
  let connection_registry = Arc::new(ConnectionRegistry::new());

  let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
  let (stdout_tx, stdout_rx) = mpsc::channel(STDOUT_QUEUE_CAPACITY);

  let ctx = ControlContext {
    process_registry: Arc::clone(&process_registry),
    stdout_forward: stdout_tx,
  };

  let inbound_connections = Arc::clone(&connection_registry);
  tokio::spawn(async move {
    run_inbound(inbound_rx, &inbound_connections, &ctx).await;
  });

  let outbound_connections = Arc::clone(&connection_registry);
  tokio::spawn(async move {
    run_outbound(stdout_rx, &outbound_connections).await;
  });

  let listener = acceptor::bind(config.socket_path())?;
  info!(event = "server_started", socket = %config.socket_path().display(), "listening for connections");

  acceptor::run(listener, &connection_registry, inbound_tx).await
}
