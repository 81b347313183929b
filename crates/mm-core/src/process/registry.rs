//! C4: the process registry. An append-only table of every process the
//! server has ever created, plus a zero-capacity notification fired each
//! time an entry is added. The outbound dispatcher (C7) subscribes to this
//! notification instead of rescanning on a timer.

use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

use super::Process;
use crate::message::ProcessId;

#[derive(Default)]
pub struct ProcessRegistry {
  processes: RwLock<Vec<Arc<Process>>>,
  added: Notify,
}

impl ProcessRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Assigns the process its id (its index in the table) and appends it.
  /// Wakes every task waiting on `wait_for_addition`.
  pub async fn add(&self, process: Arc<Process>) -> ProcessId {
    let mut guard = self.processes.write().await;
    let id = guard.len() as ProcessId;
    process.set_id(id);
    guard.push(process);
    drop(guard);
    self.added.notify_waiters();
    id
  }

  pub async fn get(&self, id: ProcessId) -> Option<Arc<Process>> {
    self.processes.read().await.get(id as usize).cloned()
  }

  pub async fn len(&self) -> usize {
    self.processes.read().await.len()
  }

  /// Resolves the next time `add` is called. Used by components that need
  /// to react to new processes without polling the table.
  pub async fn wait_for_addition(&self) {
    self.added.notified().await;
  }
}
