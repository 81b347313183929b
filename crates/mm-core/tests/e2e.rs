//! Black-box end-to-end tests (SPEC_FULL.md §8, scenarios S1-S6). Each test
//! spins up a real server bound to a temp-directory Unix socket and drives
//! it with a small in-test client built on the crate's own codec/framing,
//! exactly as SPEC_FULL.md §12 prescribes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mm_core::codec::Transport;
use mm_core::config::Config;
use mm_core::message::{Message, WindowSize};
use tokio::net::UnixStream;
use tokio::time::{sleep, timeout};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
  _dir: tempfile::TempDir,
  socket_path: PathBuf,
}

async fn start_server() -> TestServer {
  let dir = tempfile::tempdir().expect("tempdir");
  let socket_path = dir.path().join("mm.sock");
  let config = Config {
    socket_path: socket_path.clone(),
    ..Config::default()
  };

  tokio::spawn(async move {
    let _ = mm_core::server::run(config).await;
  });

  wait_for_socket(&socket_path).await;
  TestServer { _dir: dir, socket_path }
}

async fn wait_for_socket(path: &Path) {
  let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
  while tokio::time::Instant::now() < deadline {
    if path.exists() {
      return;
    }
    sleep(Duration::from_millis(10)).await;
  }
  panic!("server never bound its socket at {}", path.display());
}

async fn connect(server: &TestServer) -> Transport<UnixStream> {
  let stream = UnixStream::connect(&server.socket_path).await.expect("connect");
  Transport::new(stream)
}

async fn send(transport: &mut Transport<UnixStream>, msg: Message) {
  timeout(STEP_TIMEOUT, transport.encode(msg.into_record())).await.expect("encode timed out").expect("encode");
}

async fn recv(transport: &mut Transport<UnixStream>) -> Message {
  let record = timeout(STEP_TIMEOUT, transport.decode())
    .await
    .expect("decode timed out")
    .expect("decode")
    .expect("stream closed unexpectedly");
  Message::from_record(&record).expect("unrecognized record")
}

/// `true` if a record arrives before `timeout`, `false` on timeout (used to
/// assert the *absence* of a message, e.g. S2's non-follower).
async fn recv_within(transport: &mut Transport<UnixStream>, timeout_dur: Duration) -> Option<Message> {
  match timeout(timeout_dur, transport.decode()).await {
    Ok(Ok(Some(record))) => Some(Message::from_record(&record).expect("unrecognized record")),
    Ok(Ok(None)) => None,
    Ok(Err(e)) => panic!("decode error: {e}"),
    Err(_) => None,
  }
}

fn size(rows: i32, cols: i32) -> WindowSize {
  WindowSize { rows, cols, xpixel: 0, ypixel: 0 }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s1_echo() {
  let server = start_server().await;
  let mut client = connect(&server).await;

  send(&mut client, Message::CreateProcess { path: "/bin/cat".into(), size: size(24, 80) }).await;
  let reply = recv(&mut client).await;
  let Message::ProcessCreated { process_id } = reply else {
    panic!("expected processCreated, got {reply:?}");
  };
  assert_eq!(process_id, 0);

  send(&mut client, Message::Stdin { process_id, bytes: b"hello\n".to_vec() }).await;

  let mut collected = Vec::new();
  while !collected.starts_with(b"hello\n") {
    match recv(&mut client).await {
      Message::Stdout { process_id: pid, bytes } => {
        assert_eq!(pid, process_id);
        collected.extend_from_slice(&bytes);
      }
      other => panic!("unexpected message while waiting for echo: {other:?}"),
    }
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s2_only_the_follower_receives_stdout() {
  let server = start_server().await;
  let mut client_a = connect(&server).await;

  send(&mut client_a, Message::CreateProcess { path: "/bin/cat".into(), size: size(24, 80) }).await;
  let Message::ProcessCreated { process_id } = recv(&mut client_a).await else {
    panic!("expected processCreated");
  };

  let mut client_b = connect(&server).await;

  send(&mut client_a, Message::Stdin { process_id, bytes: b"X".to_vec() }).await;

  let mut collected = Vec::new();
  while !collected.contains(&b'X') {
    match recv(&mut client_a).await {
      Message::Stdout { bytes, .. } => collected.extend_from_slice(&bytes),
      other => panic!("unexpected message: {other:?}"),
    }
  }

  let nothing = recv_within(&mut client_b, Duration::from_millis(300)).await;
  assert!(nothing.is_none(), "non-follower unexpectedly received {nothing:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s3_resize_is_visible_to_the_child() {
  let server = start_server().await;
  let mut client = connect(&server).await;

  send(&mut client, Message::CreateProcess { path: "/bin/sh".into(), size: size(24, 80) }).await;
  let Message::ProcessCreated { process_id } = recv(&mut client).await else {
    panic!("expected processCreated");
  };

  send(&mut client, Message::Resize { process_id, size: size(40, 132) }).await;
  send(&mut client, Message::Stdin { process_id, bytes: b"stty size\n".to_vec() }).await;

  let mut collected = Vec::new();
  while !collected.windows(6).any(|w| w == b"40 132") {
    match recv(&mut client).await {
      Message::Stdout { bytes, .. } => collected.extend_from_slice(&bytes),
      other => panic!("unexpected message: {other:?}"),
    }
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s4_stdin_to_an_unknown_process_is_dropped_and_the_connection_survives() {
  let server = start_server().await;
  let mut client = connect(&server).await;

  send(&mut client, Message::Stdin { process_id: 999, bytes: b"x".to_vec() }).await;

  send(&mut client, Message::CreateProcess { path: "/bin/true".into(), size: size(24, 80) }).await;
  let reply = recv(&mut client).await;
  assert!(matches!(reply, Message::ProcessCreated { process_id: 0 }), "expected processCreated{{0}}, got {reply:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s5_server_keeps_accepting_connections_after_a_child_exits() {
  let server = start_server().await;
  let mut client = connect(&server).await;

  send(&mut client, Message::CreateProcess { path: "/bin/true".into(), size: size(24, 80) }).await;
  let Message::ProcessCreated { process_id } = recv(&mut client).await else {
    panic!("expected processCreated");
  };
  assert_eq!(process_id, 0);

  // Give /bin/true time to exit and be reaped.
  sleep(Duration::from_millis(200)).await;

  // The server must still accept new connections and assign the next id.
  let mut client2 = connect(&server).await;
  send(&mut client2, Message::CreateProcess { path: "/bin/true".into(), size: size(24, 80) }).await;
  let reply = recv(&mut client2).await;
  assert!(matches!(reply, Message::ProcessCreated { process_id: 1 }), "expected processCreated{{1}}, got {reply:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s6_connection_death_does_not_disrupt_the_server() {
  let server = start_server().await;
  let mut client_a = connect(&server).await;

  send(&mut client_a, Message::CreateProcess { path: "/bin/cat".into(), size: size(24, 80) }).await;
  let Message::ProcessCreated { process_id } = recv(&mut client_a).await else {
    panic!("expected processCreated");
  };
  assert_eq!(process_id, 0);

  drop(client_a);
  sleep(Duration::from_millis(100)).await;

  // The process registry (and hence id assignment) is unaffected by the
  // dead connection: a fresh connection's createProcess still gets the
  // next sequential id. The wire protocol has no explicit re-subscribe
  // message, so a second connection cannot itself observe process 0's
  // continued liveness (SPEC_FULL.md §7's open question on death
  // notification) beyond this indirect check.
  let mut client_b = connect(&server).await;
  send(&mut client_b, Message::CreateProcess { path: "/bin/true".into(), size: size(24, 80) }).await;
  let reply = recv(&mut client_b).await;
  assert!(matches!(reply, Message::ProcessCreated { process_id: 1 }), "expected processCreated{{1}}, got {reply:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawn_failure_is_reported_to_the_originator_not_fatal_to_the_server() {
  let server = start_server().await;
  let mut client = connect(&server).await;

  send(
    &mut client,
    Message::CreateProcess { path: "/no/such/executable-mm-test".into(), size: size(24, 80) },
  )
  .await;

  // `portable_pty` only fails the exec inside the child, so the reply we
  // actually observe for this path depends on `posix_openpt`/`fork`
  // succeeding and the exec failing asynchronously; what this test pins
  // down is that the connection survives either way and can still create
  // a working process afterwards.
  let _first_reply = recv(&mut client).await;

  send(&mut client, Message::CreateProcess { path: "/bin/true".into(), size: size(24, 80) }).await;
  let reply = recv(&mut client).await;
  assert!(matches!(reply, Message::ProcessCreated { .. } | Message::SpawnFailed { .. }), "unexpected reply: {reply:?}");
}
