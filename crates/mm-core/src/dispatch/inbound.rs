//! C6: the inbound dispatcher. Merges `(connectionId, Record)` pairs
//! forwarded by every live connection's decoder task onto one shared
//! channel, converts each `Record` into a typed `Message` (the one
//! dynamic-to-static cast point, per SPEC_FULL.md §9), and hands it to the
//! control handler (C9).

use tokio::sync::mpsc;
use tracing::warn;

use crate::codec::Record;
use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::control::{self, ControlContext};
use crate::message::Message;

/// Run the inbound dispatch loop until `inbound_rx` closes (every decoder
/// task has exited, which only happens at server shutdown since decoder
/// tasks live for the lifetime of their connection).
pub async fn run_inbound(
  mut inbound_rx: mpsc::Receiver<(ConnectionId, Record)>,
  connections: &ConnectionRegistry,
  ctx: &ControlContext,
) {
  while let Some((connection_id, record)) = inbound_rx.recv().await {
    let Some(connection) = connections.get(connection_id).await else {
      warn!(event = "dispatch_inbound_unknown_connection", connection_id, "record from an unregistered connection id");
      continue;
    };
    if !connection.is_alive() {
      continue;
    }

    match Message::from_record(&record) {
      Ok(message) => control::handle(message, &connection, ctx).await,
      Err(e) => {
        warn!(event = "dispatch_inbound_protocol_error", connection_id, error = %e, "dropping malformed or unknown message");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::process::ProcessRegistry;
  use std::sync::Arc;
  use tokio::net::UnixListener;

  #[tokio::test]
  async fn dispatches_a_known_message_to_its_owning_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inbound.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let client = tokio::net::UnixStream::connect(&path).await.unwrap();
    let (server_side, _) = listener.accept().await.unwrap();
    drop(client);

    let connections = ConnectionRegistry::new();
    let (decoder_tx, decoder_rx) = mpsc::channel(8);
    let connection = connections.accept(server_side, decoder_tx.clone()).await;
    let connection_id = connection.id();

    let ctx = ControlContext {
      process_registry: Arc::new(ProcessRegistry::new()),
      stdout_forward: mpsc::channel(8).0,
    };

    // Feed the dispatcher directly rather than through the real socket, to
    // keep this a unit test of dispatch-then-lookup rather than of codec
    // framing (which `codec::transport` already covers).
    let record = Message::Stdin { process_id: 999, bytes: b"x".to_vec() }.into_record();
    decoder_tx.send((connection_id, record)).await.unwrap();
    drop(decoder_tx);

    run_inbound(decoder_rx, &connections, &ctx).await;
  }
}
