//! The PTY OS layer collaborator (SPEC_FULL.md §6): a thin wrapper around
//! `portable_pty` for opening a master/slave pair and translating window
//! sizes. Kept separate from [`super::handle`] so the process state machine
//! never touches `portable_pty` types directly except through here.

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, SlavePty, native_pty_system};

use crate::message::WindowSize;

pub fn to_pty_size(size: &WindowSize) -> PtySize {
  PtySize {
    rows: size.rows.max(0) as u16,
    cols: size.cols.max(0) as u16,
    pixel_width: size.xpixel.max(0) as u16,
    pixel_height: size.ypixel.max(0) as u16,
  }
}

/// Open a PTY master/slave pair sized as requested.
pub fn open_pty_pair(size: &WindowSize) -> anyhow::Result<(Box<dyn MasterPty + Send>, Box<dyn SlavePty + Send>)> {
  let pty_system = native_pty_system();
  let pair = pty_system.openpty(to_pty_size(size))?;
  Ok((pair.master, pair.slave))
}

/// Bind the child's stdin/stdout/stderr to `slave` and spawn `path` as a
/// new session controlling the slave TTY. Consumes `slave`, matching
/// `portable_pty`'s API where spawning a command is the act of attaching it.
pub fn attach_child_to_slave(
  slave: Box<dyn SlavePty + Send>,
  path: &str,
) -> anyhow::Result<Box<dyn Child + Send + Sync>> {
  let cmd = CommandBuilder::new(path);
  let child = slave.spawn_command(cmd)?;
  Ok(child)
}

/// Issue the platform window-size ioctl on the master fd. Idempotent.
pub fn set_win_size(master: &dyn MasterPty, size: &WindowSize) -> anyhow::Result<()> {
  master.resize(to_pty_size(size))?;
  Ok(())
}
