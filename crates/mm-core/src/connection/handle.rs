//! C3: the connection handle. Each accepted client socket becomes one
//! `Connection`, decoded and encoded by a pair of cooperating tasks that
//! forward directly onto shared channels rather than being polled by a
//! central loop. Construction is two-phase (`new` then `spawn_io`) so the
//! registry can assign the real id before either task starts; see
//! [`crate::connection::ConnectionRegistry::accept`].

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::codec::{DecodeHalf, EncodeHalf, Record, Transport};
use crate::message::ProcessId;

pub type ConnectionId = u32;

/// How many outbound records may queue for a connection before the sender
/// (an outbound-dispatcher fan-out, or a control-handler reply) blocks.
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// One accepted client socket. Outlives the underlying stream only as long
/// as its decoder and encoder tasks are running; once both exit the
/// connection is considered dead and is pruned lazily by anything iterating
/// the connection registry.
pub struct Connection {
  id: AtomicU32,
  outbound_tx: mpsc::Sender<Record>,
  following: Mutex<HashSet<ProcessId>>,
  alive: std::sync::atomic::AtomicBool,
}

impl Connection {
  /// Constructs a connection with no id assigned yet and no tasks running.
  /// Callers must register the returned handle with the connection registry
  /// (which assigns the real id) before calling `spawn_io`, so that the
  /// decoder task never forwards a record tagged with the `u32::MAX`
  /// sentinel. See [`crate::connection::ConnectionRegistry::accept`], the
  /// only sanctioned way to go from an accepted socket to a running,
  /// registered connection.
  pub(crate) fn new() -> (Arc<Self>, mpsc::Receiver<Record>) {
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let connection = Arc::new(Self {
      id: AtomicU32::new(u32::MAX),
      outbound_tx,
      following: Mutex::new(HashSet::new()),
      alive: std::sync::atomic::AtomicBool::new(true),
    });
    (connection, outbound_rx)
  }

  /// Launches the decoder and encoder tasks for an already-registered
  /// connection. Decoded records are forwarded as `(connection_id, Record)`
  /// onto `inbound_tx`, the single channel owned by the inbound dispatcher
  /// (C6); `self.id()` must already hold its real, registry-assigned value
  /// by the time this is called.
  pub(crate) fn spawn_io(self: &Arc<Self>, stream: UnixStream, inbound_tx: mpsc::Sender<(ConnectionId, Record)>, outbound_rx: mpsc::Receiver<Record>) {
    let (decode_half, encode_half) = Transport::new(stream).split();
    tokio::spawn(decoder_task(Arc::clone(self), decode_half, inbound_tx));
    tokio::spawn(encoder_task(Arc::clone(self), encode_half, outbound_rx));
  }

  pub fn id(&self) -> ConnectionId {
    self.id.load(Ordering::SeqCst)
  }

  pub(crate) fn set_id(&self, id: ConnectionId) {
    self.id.store(id, Ordering::SeqCst);
  }

  pub fn is_alive(&self) -> bool {
    self.alive.load(Ordering::SeqCst)
  }

  /// Queue a record for delivery to this connection's client. Used both by
  /// the outbound dispatcher (fanning out `stdout`) and by control handlers
  /// replying directly to the connection that sent a request.
  pub async fn send(&self, record: Record) {
    if self.outbound_tx.send(record).await.is_err() {
      debug!(event = "connection_send_after_close", connection_id = self.id());
    }
  }

  pub fn follow(&self, process_id: ProcessId) {
    self.following.lock().unwrap().insert(process_id);
  }

  pub fn unfollow(&self, process_id: ProcessId) {
    self.following.lock().unwrap().remove(&process_id);
  }

  pub fn is_following(&self, process_id: ProcessId) -> bool {
    self.following.lock().unwrap().contains(&process_id)
  }

  fn mark_dead(&self) {
    self.alive.store(false, Ordering::SeqCst);
  }
}

async fn decoder_task(
  connection: Arc<Connection>,
  mut decode_half: DecodeHalf<UnixStream>,
  inbound_tx: mpsc::Sender<(ConnectionId, Record)>,
) {
  loop {
    match decode_half.decode().await {
      Ok(Some(record)) => {
        if inbound_tx.send((connection.id(), record)).await.is_err() {
          break;
        }
      }
      Ok(None) => {
        debug!(event = "connection_closed_by_peer", connection_id = connection.id());
        break;
      }
      Err(e) => {
        warn!(event = "connection_decode_error", connection_id = connection.id(), error = %e);
        break;
      }
    }
  }
  connection.mark_dead();
}

async fn encoder_task(
  connection: Arc<Connection>,
  mut encode_half: EncodeHalf<UnixStream>,
  mut outbound_rx: mpsc::Receiver<Record>,
) {
  while let Some(record) = outbound_rx.recv().await {
    if let Err(e) = encode_half.encode(record).await {
      warn!(event = "connection_encode_error", connection_id = connection.id(), error = %e);
      break;
    }
  }
  connection.mark_dead();
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn following_tracks_distinct_process_ids() {
    let following = Mutex::new(HashSet::new());
    following.lock().unwrap().insert(1u32);
    following.lock().unwrap().insert(2u32);
    assert!(following.lock().unwrap().contains(&1));
    following.lock().unwrap().remove(&1);
    assert!(!following.lock().unwrap().contains(&1));
    assert!(following.lock().unwrap().contains(&2));
  }
}
