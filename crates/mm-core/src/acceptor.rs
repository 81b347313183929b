//! C8: the acceptor. Binds the local Unix-domain listener and, for each
//! accepted socket, hands it to C5's `accept`, which registers the
//! connection (assigning its id) before wiring it to the inbound
//! dispatcher's shared channel.

use std::path::Path;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::info;

use crate::codec::Record;
use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::error::ServerError;

/// Bind the listening socket, removing a stale socket file left behind by
/// a previous run (matching this codebase's existing daemon bootstrap).
pub fn bind(socket_path: &Path) -> Result<UnixListener, ServerError> {
  if let Some(parent) = socket_path.parent()
    && !parent.as_os_str().is_empty()
  {
    let _ = std::fs::create_dir_all(parent);
  }
  let _ = std::fs::remove_file(socket_path);

  UnixListener::bind(socket_path).map_err(|source| ServerError::Bind {
    path: socket_path.to_path_buf(),
    source,
  })
}

/// Run the accept loop: on success, register a new `Connection`; on
/// failure, the loop itself is fatal to the server (SPEC_FULL.md §4.10),
/// so the error is propagated to the caller rather than swallowed.
pub async fn run(
  listener: UnixListener,
  connections: &ConnectionRegistry,
  inbound_tx: mpsc::Sender<(ConnectionId, Record)>,
) -> Result<(), ServerError> {
  loop {
    let (stream, _addr) = listener.accept().await.map_err(ServerError::Accept)?;
    accept_one(stream, connections, inbound_tx.clone()).await;
  }
}

async fn accept_one(stream: UnixStream, connections: &ConnectionRegistry, inbound_tx: mpsc::Sender<(ConnectionId, Record)>) {
  let connection = connections.accept(stream, inbound_tx).await;
  info!(event = "connection_accepted", connection_id = connection.id(), "accepted a new client connection");
}
