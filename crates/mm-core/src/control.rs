//! C9: control handlers. One function per inbound `Message` variant,
//! dispatching on the `messageType` the decoder already turned into a typed
//! [`Message`] (SPEC_FULL.md §4.9). Handlers mutate C2/C4 and reply through
//! the owning connection's outbound queue; they never touch the wire codec
//! directly.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::message::{Message, ProcessId};
use crate::process::{Process, ProcessRegistry};

/// Shared context every control handler needs: the process registry to
/// mutate, and the sender half of the outbound-dispatcher's shared stdout
/// channel that a newly started process's stdout-filler forwards into.
pub struct ControlContext {
  pub process_registry: Arc<ProcessRegistry>,
  pub stdout_forward: mpsc::Sender<(ProcessId, Vec<u8>)>,
}

/// Handle one decoded message on behalf of `origin`, the connection it
/// arrived on. Per SPEC_FULL.md §4.9, failures are message-local: they are
/// logged and the session continues.
pub async fn handle(msg: Message, origin: &Arc<Connection>, ctx: &ControlContext) {
  match msg {
    Message::Stdin { process_id, bytes } => handle_stdin(process_id, bytes, ctx).await,
    Message::Resize { process_id, size } => handle_resize(process_id, size, ctx).await,
    Message::CreateProcess { path, size } => handle_create_process(path, size, origin, ctx).await,
    other @ (Message::Stdout { .. } | Message::ProcessCreated { .. } | Message::SpawnFailed { .. }) => {
      warn!(
        event = "control_unexpected_direction",
        connection_id = origin.id(),
        message_type = other.message_type(),
        "dropping a server-to-client message type received from a client"
      );
    }
  }
}

async fn handle_stdin(process_id: ProcessId, bytes: Vec<u8>, ctx: &ControlContext) {
  let Some(process) = ctx.process_registry.get(process_id).await else {
    warn!(event = "control_invalid_process_id", process_id, message_type = "stdin", "unknown process id, dropping");
    return;
  };
  debug!(event = "control_stdin", process_id, bytes = bytes.len());
  if process.send_stdin(bytes).await.is_err() {
    warn!(event = "control_stdin_dead_process", process_id, "process no longer alive, dropping");
  }
}

async fn handle_resize(process_id: ProcessId, size: crate::message::WindowSize, ctx: &ControlContext) {
  let Some(process) = ctx.process_registry.get(process_id).await else {
    warn!(event = "control_invalid_process_id", process_id, message_type = "resize", "unknown process id, dropping");
    return;
  };
  debug!(event = "control_resize", process_id, rows = size.rows, cols = size.cols);
  if let Err(e) = process.set_size(&size) {
    warn!(event = "control_resize_failed", process_id, error = %e);
  }
}

async fn handle_create_process(
  path: String,
  size: crate::message::WindowSize,
  origin: &Arc<Connection>,
  ctx: &ControlContext,
) {
  let process = match Process::create(path.as_str(), &size) {
    Ok(process) => Arc::new(process),
    Err(e) => {
      warn!(event = "control_spawn_failed", path = %path, error = %e, "createProcess spawn setup failed");
      origin.send(Message::SpawnFailed { reason: e.to_string() }.into_record()).await;
      return;
    }
  };

  let process_id = ctx.process_registry.add(Arc::clone(&process)).await;

  if let Err(e) = process.start(ctx.stdout_forward.clone()) {
    warn!(event = "control_spawn_failed", process_id, path = %path, error = %e, "createProcess start failed");
    origin.send(Message::SpawnFailed { reason: e.to_string() }.into_record()).await;
    return;
  }

  debug!(event = "control_create_process", process_id, path = %path, connection_id = origin.id());

  // The reply is sent, and the originator begins following, before the
  // dispatcher can observe any stdout for this process (SPEC_FULL.md §5,
  // ordering guarantee 3): the stdout-filler was only just spawned by
  // `start` above and hasn't had a chance to produce a chunk yet, and
  // `follow` runs synchronously on this same task before we return.
  origin.send(Message::ProcessCreated { process_id }.into_record()).await;
  origin.follow(process_id);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::connection::ConnectionRegistry;
  use tokio::net::UnixListener;

  async fn test_connection() -> (Arc<Connection>, mpsc::Receiver<(crate::connection::ConnectionId, crate::codec::Record)>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ctl.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let client = tokio::net::UnixStream::connect(&path).await.unwrap();
    let (server_side, _) = listener.accept().await.unwrap();
    drop(client);

    let (inbound_tx, inbound_rx) = mpsc::channel(8);
    let registry = ConnectionRegistry::new();
    let connection = registry.accept(server_side, inbound_tx).await;
    (connection, inbound_rx)
  }

  #[tokio::test]
  async fn stdin_to_unknown_process_is_dropped_without_panicking() {
    let (connection, _inbound_rx) = test_connection().await;
    let (stdout_tx, _stdout_rx) = mpsc::channel(8);
    let ctx = ControlContext {
      process_registry: Arc::new(ProcessRegistry::new()),
      stdout_forward: stdout_tx,
    };

    handle(
      Message::Stdin { process_id: 999, bytes: b"x".to_vec() },
      &connection,
      &ctx,
    )
    .await;
  }

  #[tokio::test]
  async fn resize_on_unknown_process_is_dropped_without_panicking() {
    let (connection, _inbound_rx) = test_connection().await;
    let (stdout_tx, _stdout_rx) = mpsc::channel(8);
    let ctx = ControlContext {
      process_registry: Arc::new(ProcessRegistry::new()),
      stdout_forward: stdout_tx,
    };

    handle(
      Message::Resize {
        process_id: 999,
        size: crate::message::WindowSize { rows: 10, cols: 10, xpixel: 0, ypixel: 0 },
      },
      &connection,
      &ctx,
    )
    .await;
  }
}
