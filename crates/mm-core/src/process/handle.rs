//! C2: the PTY process handle. Owns the full lifecycle of a child attached
//! to a PTY master, per SPEC_FULL.md §4.2: `create` opens the PTY pair
//! without starting the child, `start` forks/execs and launches the three
//! cooperating tasks (stdin-drainer, stdout-filler, reaper), and
//! `terminate` is the one idempotent shutdown entry point.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use portable_pty::{ChildKiller, MasterPty, SlavePty};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, warn};

use super::os;
use crate::error::ProcessError;
use crate::message::{ProcessId, WindowSize};

/// How many 1024-byte reads may be in flight between the PTY and the
/// outbound dispatcher before the stdout-filler blocks; kept tiny to
/// approximate the reference design's rendezvous queues (SPEC_FULL.md §14,
/// Open Question 4).
const STDIN_QUEUE_CAPACITY: usize = 1;
const STDOUT_READ_CHUNK: usize = 1024;
const TERMINATE_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessState {
  Created,
  Started,
  Terminating,
  Dead,
}

/// A live (or recently-live) child process attached to a PTY. Always held
/// behind an `Arc` once registered, since the stdin-drainer, stdout-filler,
/// and reaper tasks each hold a clone.
pub struct Process {
  id: AtomicU32,
  path: String,
  master: Mutex<Option<Box<dyn MasterPty + Send>>>,
  slave: Mutex<Option<Box<dyn SlavePty + Send>>>,
  child_killer: Mutex<Option<Box<dyn ChildKiller + Send + Sync>>>,
  state: Mutex<ProcessState>,
  stdin_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
  stdin_rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
  terminate_notify: Notify,
  io_threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Process {
  /// C2 `create(path)`. Opens the PTY pair but does not yet spawn the
  /// child; see `start`.
  pub fn create(path: impl Into<String>, size: &WindowSize) -> Result<Self, ProcessError> {
    let path = path.into();
    let (master, slave) = os::open_pty_pair(size)?;
    let (stdin_tx, stdin_rx) = mpsc::channel(STDIN_QUEUE_CAPACITY);

    debug!(event = "process_create", path = %path, rows = size.rows, cols = size.cols, "opened pty pair");

    Ok(Self {
      id: AtomicU32::new(u32::MAX),
      path,
      master: Mutex::new(Some(master)),
      slave: Mutex::new(Some(slave)),
      child_killer: Mutex::new(None),
      state: Mutex::new(ProcessState::Created),
      stdin_tx: Mutex::new(Some(stdin_tx)),
      stdin_rx: Mutex::new(Some(stdin_rx)),
      terminate_notify: Notify::new(),
      io_threads: Mutex::new(Vec::new()),
    })
  }

  pub fn id(&self) -> ProcessId {
    self.id.load(Ordering::SeqCst)
  }

  /// Assigned exactly once by the process registry at registration time.
  pub(crate) fn set_id(&self, id: ProcessId) {
    self.id.store(id, Ordering::SeqCst);
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn is_alive(&self) -> bool {
    *self.state.lock().unwrap() == ProcessState::Started
  }

  /// C2 `setSize`. Idempotent; callable before or after `start`.
  pub fn set_size(&self, size: &WindowSize) -> Result<(), ProcessError> {
    let guard = self.master.lock().unwrap();
    match guard.as_deref() {
      Some(master) => {
        os::set_win_size(master, size)?;
        Ok(())
      }
      None => Err(ProcessError::NotAlive),
    }
  }

  /// C2 `start()`. Forks/execs the child and launches the stdin-drainer,
  /// stdout-filler, and reaper. `stdout_forward` is the shared channel
  /// owned by the outbound dispatcher (C7) that every process's
  /// stdout-filler forwards `(processId, bytes)` chunks into.
  pub fn start(self: &Arc<Self>, stdout_forward: mpsc::Sender<(ProcessId, Vec<u8>)>) -> Result<(), ProcessError> {
    {
      let mut state = self.state.lock().unwrap();
      if *state != ProcessState::Created {
        return Ok(());
      }
      *state = ProcessState::Started;
    }

    // From here on, any failure must leave the process in `Dead` rather
    // than the falsely-alive `Started` we just set above: nothing would
    // ever transition it out of `Started` otherwise, since no reaper gets
    // spawned to do so.
    match self.try_start(stdout_forward) {
      Ok(()) => Ok(()),
      Err(e) => {
        warn!(event = "process_start_failed", process_id = self.id(), path = %self.path, error = %e);
        *self.state.lock().unwrap() = ProcessState::Dead;
        self.stdin_tx.lock().unwrap().take();
        self.master.lock().unwrap().take();
        Err(e)
      }
    }
  }

  fn try_start(self: &Arc<Self>, stdout_forward: mpsc::Sender<(ProcessId, Vec<u8>)>) -> Result<(), ProcessError> {
    let slave = self.slave.lock().unwrap().take().ok_or(ProcessError::NotAlive)?;
    let child = os::attach_child_to_slave(slave, &self.path)?;
    *self.child_killer.lock().unwrap() = Some(child.clone_killer());

    let (writer, reader) = {
      let guard = self.master.lock().unwrap();
      let master = guard.as_deref().ok_or(ProcessError::NotAlive)?;
      (master.take_writer()?, master.try_clone_reader()?)
    };

    let stdin_rx = self.stdin_rx.lock().unwrap().take().ok_or(ProcessError::NotAlive)?;

    info!(event = "process_started", process_id = self.id(), path = %self.path, "process started");

    let mut threads = Vec::with_capacity(2);
    threads.push(spawn_stdin_drainer(Arc::clone(self), writer, stdin_rx));
    threads.push(spawn_stdout_filler(Arc::clone(self), reader, stdout_forward));
    *self.io_threads.lock().unwrap() = threads;

    tokio::spawn(reaper(Arc::clone(self), child));

    Ok(())
  }

  /// C9's entry point for `stdin` messages. Permitted to block (no
  /// timeout) if the queue is full, per SPEC_FULL.md §4.9.
  pub async fn send_stdin(&self, bytes: Vec<u8>) -> Result<(), ProcessError> {
    if !self.is_alive() {
      return Err(ProcessError::NotAlive);
    }
    let tx = { self.stdin_tx.lock().unwrap().clone() };
    match tx {
      Some(tx) => tx.send(bytes).await.map_err(|_| ProcessError::NotAlive),
      None => Err(ProcessError::NotAlive),
    }
  }

  /// C2 `terminate()`. Idempotent; only signals the reaper. The reaper
  /// itself joins the I/O tasks, closes the queues, closes the PTY master,
  /// and flips the liveness flag via `finish`.
  pub fn terminate(&self) {
    let mut state = self.state.lock().unwrap();
    if *state == ProcessState::Terminating || *state == ProcessState::Dead {
      return;
    }
    *state = ProcessState::Terminating;
    drop(state);
    self.terminate_notify.notify_one();
  }

  /// Invoked exactly once, by the reaper, once the child has exited (or
  /// been force-killed). Closes both queues and the PTY master, flips
  /// liveness, and joins the stdin-drainer/stdout-filler threads.
  ///
  /// The joins run inside `spawn_blocking` rather than on the calling
  /// task's worker thread: a stdout-filler can be parked in
  /// `stdout_forward.blocking_send` waiting for the outbound dispatcher to
  /// drain a slow follower's queue, and the dispatcher itself needs a free
  /// worker thread to make progress. Joining inline from the reaper (a
  /// plain `tokio::spawn`ed task) could starve that worker thread, a real
  /// deadlock risk in runtimes configured with few threads.
  async fn finish(&self) {
    *self.state.lock().unwrap() = ProcessState::Dead;
    self.stdin_tx.lock().unwrap().take();
    self.master.lock().unwrap().take();
    info!(event = "process_terminated", process_id = self.id(), path = %self.path, "process terminated");

    let threads = std::mem::take(&mut *self.io_threads.lock().unwrap());
    let _ = tokio::task::spawn_blocking(move || {
      for handle in threads {
        let _ = handle.join();
      }
    })
    .await;
  }
}

fn spawn_stdin_drainer(
  process: Arc<Process>,
  mut writer: Box<dyn Write + Send>,
  mut stdin_rx: mpsc::Receiver<Vec<u8>>,
) -> JoinHandle<()> {
  thread::spawn(move || {
    while let Some(chunk) = stdin_rx.blocking_recv() {
      match writer.write(&chunk) {
        Ok(n) if n == chunk.len() => {
          debug!(event = "process_stdin_write", process_id = process.id(), bytes = n);
        }
        Ok(n) => {
          panic!(
            "short write to pty stdin for process {}: wrote {n} of {} bytes (invariant violation)",
            process.id(),
            chunk.len()
          );
        }
        Err(e) => {
          error!(event = "process_stdin_write_error", process_id = process.id(), error = %e);
          process.terminate();
          break;
        }
      }
    }
  })
}

fn spawn_stdout_filler(
  process: Arc<Process>,
  mut reader: Box<dyn Read + Send>,
  stdout_forward: mpsc::Sender<(ProcessId, Vec<u8>)>,
) -> JoinHandle<()> {
  thread::spawn(move || {
    let mut buf = [0u8; STDOUT_READ_CHUNK];
    loop {
      match reader.read(&mut buf) {
        Ok(0) => {
          debug!(event = "process_stdout_eof", process_id = process.id());
          process.terminate();
          break;
        }
        Ok(n) => {
          let chunk = buf[..n].to_vec();
          debug!(event = "process_stdout_read", process_id = process.id(), bytes = n);
          if stdout_forward.blocking_send((process.id(), chunk)).is_err() {
            // Outbound dispatcher is gone (server shutting down); stop reading.
            break;
          }
        }
        Err(e) => {
          warn!(event = "process_stdout_read_error", process_id = process.id(), error = %e);
          process.terminate();
          break;
        }
      }
    }
  })
}

async fn reaper(process: Arc<Process>, mut child: Box<dyn portable_pty::Child + Send + Sync>) {
  let wait_handle = tokio::task::spawn_blocking(move || child.wait());
  tokio::pin!(wait_handle);

  tokio::select! {
    res = &mut wait_handle => {
      log_exit(&process, res);
      process.finish().await;
      return;
    }
    _ = process.terminate_notify.notified() => {}
  }

  tokio::select! {
    res = &mut wait_handle => {
      log_exit(&process, res);
    }
    _ = tokio::time::sleep(TERMINATE_GRACE) => {
      warn!(event = "process_force_kill", process_id = process.id(), "grace period elapsed, force-killing child");
      if let Some(killer) = process.child_killer.lock().unwrap().as_mut() {
        let _ = killer.kill();
      }
      let res = wait_handle.await;
      log_exit(&process, res);
    }
  }

  process.finish().await;
}

fn log_exit(
  process: &Process,
  res: Result<std::io::Result<portable_pty::ExitStatus>, tokio::task::JoinError>,
) {
  match res {
    Ok(Ok(status)) => {
      info!(event = "process_child_exit", process_id = process.id(), success = status.success(), "child exited");
    }
    Ok(Err(e)) => {
      warn!(event = "process_child_wait_error", process_id = process.id(), error = %e);
    }
    Err(e) => {
      warn!(event = "process_child_wait_join_error", process_id = process.id(), error = %e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn size() -> WindowSize {
    WindowSize { rows: 24, cols: 80, xpixel: 0, ypixel: 0 }
  }

  #[test]
  fn id_is_unset_until_registration() {
    let process = Process::create("/bin/true", &size()).expect("create");
    assert_eq!(process.id(), u32::MAX);
    process.set_id(0);
    assert_eq!(process.id(), 0);
  }

  #[test]
  fn not_alive_before_start() {
    let process = Process::create("/bin/true", &size()).expect("create");
    assert!(!process.is_alive());
  }

  #[test]
  fn terminate_before_start_is_a_harmless_no_op() {
    let process = Process::create("/bin/true", &size()).expect("create");
    process.terminate();
    process.terminate();
    assert!(!process.is_alive());
  }

  #[test]
  fn a_failed_start_leaves_the_process_dead_rather_than_stuck_alive() {
    let process = Arc::new(Process::create("/no/such/executable-mm-test", &size()).expect("create"));
    let (tx, _rx) = mpsc::channel(1);
    let result = process.start(tx);
    assert!(result.is_err());
    assert!(!process.is_alive());
  }
}
