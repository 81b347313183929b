//! The typed `Message` union (SPEC_FULL.md §3, §9). This is the one place
//! in the crate that performs the dynamic-record-to-static-type cast: every
//! other component only ever sees a [`Message`], never a raw [`Record`].

use crate::codec::{Record, Value};
use crate::error::ProtocolError;

pub type ProcessId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct WindowSize {
  pub rows: i32,
  pub cols: i32,
  pub xpixel: i32,
  pub ypixel: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
  /// Client -> server: bytes to write to a process's stdin.
  Stdin { process_id: ProcessId, bytes: Vec<u8> },
  /// Client -> server: resize a process's PTY.
  Resize { process_id: ProcessId, size: WindowSize },
  /// Client -> server: spawn a new process on a new PTY.
  CreateProcess { path: String, size: WindowSize },
  /// Server -> client: a chunk of a process's stdout.
  Stdout { process_id: ProcessId, bytes: Vec<u8> },
  /// Server -> client: reply to a successful `createProcess`.
  ProcessCreated { process_id: ProcessId },
  /// Server -> client: reply to a `createProcess` whose spawn failed
  /// (SPEC_FULL.md §14, Open Question 1).
  SpawnFailed { reason: String },
}

impl Message {
  pub fn message_type(&self) -> &'static str {
    match self {
      Message::Stdin { .. } => "stdin",
      Message::Resize { .. } => "resize",
      Message::CreateProcess { .. } => "createProcess",
      Message::Stdout { .. } => "stdout",
      Message::ProcessCreated { .. } => "processCreated",
      Message::SpawnFailed { .. } => "spawnFailed",
    }
  }

  /// The single dynamic-to-static cast point: convert a decoded [`Record`]
  /// into a typed `Message`, or reject it as unknown/malformed.
  pub fn from_record(record: &Record) -> Result<Self, ProtocolError> {
    match record.message_type.as_str() {
      "stdin" => Ok(Message::Stdin {
        process_id: get_int(record, "stdin", "processId")? as ProcessId,
        bytes: get_bytes(record, "stdin", "bytes")?.to_vec(),
      }),
      "resize" => Ok(Message::Resize {
        process_id: get_int(record, "resize", "processId")? as ProcessId,
        size: get_window_size(record, "resize")?,
      }),
      "createProcess" => Ok(Message::CreateProcess {
        path: get_str(record, "createProcess", "path")?.to_string(),
        size: get_window_size(record, "createProcess")?,
      }),
      "stdout" => Ok(Message::Stdout {
        process_id: get_int(record, "stdout", "processId")? as ProcessId,
        bytes: get_bytes(record, "stdout", "bytes")?.to_vec(),
      }),
      "processCreated" => Ok(Message::ProcessCreated {
        process_id: get_int(record, "processCreated", "processId")? as ProcessId,
      }),
      "spawnFailed" => Ok(Message::SpawnFailed {
        reason: get_str(record, "spawnFailed", "reason")?.to_string(),
      }),
      other => Err(ProtocolError::UnknownMessageType(other.to_string())),
    }
  }

  /// The reverse cast, used by the encoder before handing a record to C1.
  pub fn into_record(self) -> Record {
    match self {
      Message::Stdin { process_id, bytes } => Record::new("stdin")
        .with("processId", Value::Int(process_id as i32))
        .with("bytes", Value::Bytes(bytes)),
      Message::Resize { process_id, size } => {
        Record::new("resize").with("processId", Value::Int(process_id as i32)).with_size(size)
      }
      Message::CreateProcess { path, size } => {
        Record::new("createProcess").with("path", Value::Str(path)).with_size(size)
      }
      Message::Stdout { process_id, bytes } => Record::new("stdout")
        .with("processId", Value::Int(process_id as i32))
        .with("bytes", Value::Bytes(bytes)),
      Message::ProcessCreated { process_id } => {
        Record::new("processCreated").with("processId", Value::Int(process_id as i32))
      }
      Message::SpawnFailed { reason } => Record::new("spawnFailed").with("reason", Value::Str(reason)),
    }
  }
}

/// Small private extension so `into_record` can attach the four window-size
/// fields without repeating the same four `.with(...)` calls at every
/// message-type arm above.
trait WithSize {
  fn with_size(self, size: WindowSize) -> Record;
}

impl WithSize for Record {
  fn with_size(self, size: WindowSize) -> Record {
    self
      .with("rows", Value::Int(size.rows))
      .with("cols", Value::Int(size.cols))
      .with("xpixel", Value::Int(size.xpixel))
      .with("ypixel", Value::Int(size.ypixel))
  }
}

fn get_int(record: &Record, message_type: &str, field: &'static str) -> Result<i32, ProtocolError> {
  record
    .get(field)
    .and_then(Value::as_int)
    .ok_or_else(|| ProtocolError::MalformedRecord {
      message_type: message_type.to_string(),
      field,
    })
}

fn get_str<'a>(record: &'a Record, message_type: &str, field: &'static str) -> Result<&'a str, ProtocolError> {
  record
    .get(field)
    .and_then(Value::as_str)
    .ok_or_else(|| ProtocolError::MalformedRecord {
      message_type: message_type.to_string(),
      field,
    })
}

fn get_bytes<'a>(record: &'a Record, message_type: &str, field: &'static str) -> Result<&'a [u8], ProtocolError> {
  record
    .get(field)
    .and_then(Value::as_bytes)
    .ok_or_else(|| ProtocolError::MalformedRecord {
      message_type: message_type.to_string(),
      field,
    })
}

fn get_window_size(record: &Record, message_type: &str) -> Result<WindowSize, ProtocolError> {
  Ok(WindowSize {
    rows: get_int(record, message_type, "rows")?,
    cols: get_int(record, message_type, "cols")?,
    xpixel: get_int(record, message_type, "xpixel")?,
    ypixel: get_int(record, message_type, "ypixel")?,
  })
}
