//! C7: the outbound dispatcher. Merges `(processId, bytes)` chunks
//! forwarded by every live process's stdout-filler thread onto one shared
//! channel and fans each chunk out to every connection currently following
//! that process.

use tokio::sync::mpsc;
use tracing::debug;

use crate::connection::ConnectionRegistry;
use crate::message::{Message, ProcessId};

/// Run the outbound dispatch loop until `stdout_rx` closes (every
/// stdout-filler has exited, which only happens at server shutdown).
///
/// Per SPEC_FULL.md §4.7/§5, the fan-out publish may block on any one slow
/// follower's outbound queue; this is the documented backpressure
/// trade-off, not a bug, so a single slow follower can delay delivery to
/// the others (but never drops a chunk).
pub async fn run_outbound(mut stdout_rx: mpsc::Receiver<(ProcessId, Vec<u8>)>, connections: &ConnectionRegistry) {
  while let Some((process_id, bytes)) = stdout_rx.recv().await {
    let followers = connections.followers_of(process_id).await;
    debug!(event = "dispatch_outbound_chunk", process_id, bytes = bytes.len(), followers = followers.len());
    for follower in followers {
      let record = Message::Stdout { process_id, bytes: bytes.clone() }.into_record();
      follower.send(record).await;
    }
  }
}
