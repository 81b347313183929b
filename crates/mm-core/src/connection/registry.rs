//! C5: the connection registry. Mirrors [`crate::process::ProcessRegistry`]
//! for live client connections, including its zero-capacity "new entity"
//! notification; entries are never removed, only marked dead, since a
//! `ConnectionId` may still be referenced by a process's follower set after
//! the client disconnects.

use std::sync::Arc;

use tokio::net::UnixStream;
use tokio::sync::{Notify, RwLock, mpsc};

use super::{Connection, ConnectionId};
use crate::codec::Record;

#[derive(Default)]
pub struct ConnectionRegistry {
  connections: RwLock<Vec<Arc<Connection>>>,
  added: Notify,
}

impl ConnectionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers an accepted socket: constructs its `Connection`, assigns the
  /// id, and only then launches the decoder/encoder tasks, so the decoder
  /// never observes the `u32::MAX` placeholder id.
  pub async fn accept(&self, stream: UnixStream, inbound_tx: mpsc::Sender<(ConnectionId, Record)>) -> Arc<Connection> {
    let (connection, outbound_rx) = Connection::new();
    self.add(Arc::clone(&connection)).await;
    connection.spawn_io(stream, inbound_tx, outbound_rx);
    connection
  }

  /// Assigns the connection its id (its index in the table) and appends it.
  /// Wakes every task waiting on `wait_for_addition`.
  pub async fn add(&self, connection: Arc<Connection>) -> ConnectionId {
    let mut guard = self.connections.write().await;
    let id = guard.len() as ConnectionId;
    connection.set_id(id);
    guard.push(connection);
    drop(guard);
    self.added.notify_waiters();
    id
  }

  pub async fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
    self.connections.read().await.get(id as usize).cloned()
  }

  /// Resolves the next time `add` is called. Used by components that need
  /// to react to new connections without polling the table.
  pub async fn wait_for_addition(&self) {
    self.added.notified().await;
  }

  /// All currently-live connections following `process_id`, for the
  /// outbound dispatcher's stdout fan-out.
  pub async fn followers_of(&self, process_id: crate::message::ProcessId) -> Vec<Arc<Connection>> {
    self
      .connections
      .read()
      .await
      .iter()
      .filter(|c| c.is_alive() && c.is_following(process_id))
      .cloned()
      .collect()
  }

  pub async fn len(&self) -> usize {
    self.connections.read().await.len()
  }
}
