use thiserror::Error;

/// Errors surfaced by the codec adapter (C1).
#[derive(Debug, Error)]
pub enum CodecError {
  #[error("decode: {0}")]
  Decode(String),
  #[error("encode: {0}")]
  Encode(String),
  #[error("connection closed")]
  Eof,
}

/// Errors surfaced while converting a decoded [`crate::codec::Record`] into a
/// typed [`crate::message::Message`], or while constructing a message the
/// client sent us didn't know how to produce.
#[derive(Debug, Error)]
pub enum ProtocolError {
  #[error("unknown messageType `{0}`")]
  UnknownMessageType(String),
  #[error("field `{field}` missing or wrong type for messageType `{message_type}`")]
  MalformedRecord {
    message_type: String,
    field: &'static str,
  },
}

/// Errors surfaced by the PTY process handle (C2).
#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("spawn setup failed: {0}")]
  SpawnSetup(#[from] anyhow::Error),
  #[error("pty io error: {0}")]
  PtyIo(#[from] std::io::Error),
  #[error("process is not alive")]
  NotAlive,
}

/// Errors surfaced at startup (schema/codec configuration).
#[derive(Debug, Error)]
pub enum SchemaLoadError {
  #[error("failed to load schema `{schema}`: {source}")]
  Io {
    schema: &'static str,
    #[source]
    source: std::io::Error,
  },
}

/// Errors that abort the whole server (SPEC_FULL.md §4.10, §7): a failed
/// schema load or a listener that cannot be bound. Per-connection and
/// per-process errors never surface here.
#[derive(Debug, Error)]
pub enum ServerError {
  #[error("schema load failed: {0}")]
  SchemaLoad(#[from] SchemaLoadError),
  #[error("failed to bind socket {path}: {source}")]
  Bind {
    path: std::path::PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("accept failed: {0}")]
  Accept(#[source] std::io::Error),
}
