//! Core library for the PTY multiplexer server.
//!
//! Owns the concurrent I/O multiplexing engine described in SPEC_FULL.md:
//! the PTY process handle (`process`), the framed client connection handle
//! (`connection`), the append-only registries for each (`process`,
//! `connection`), the inbound/outbound dispatchers (`dispatch`), the
//! control handlers that interpret `stdin`/`resize`/`createProcess`
//! (`control`), the acceptor (`acceptor`), and the wire codec adapter
//! (`codec`). `server::run` assembles all of the above into a running
//! server; `mm-server`'s binary crate only adds process bootstrap.

pub mod acceptor;
pub mod codec;
pub mod config;
pub mod connection;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod message;
pub mod process;
pub mod server;
