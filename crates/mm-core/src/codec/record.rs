//! The dynamic record representation the codec adapter (C1) operates over.
//!
//! SPEC_FULL.md's redesign notes call for keeping the system statically
//! typed everywhere except at the decode/dispatch boundary: the codec hands
//! back a generic, schema-shaped [`Record`] with a dynamic key->value map,
//! and exactly one place (`crate::message`) casts that into the typed
//! `Message` enum. Nothing else in the crate touches `Record` directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A dynamically typed field value, mirroring the handful of primitive
/// types the wire schemas use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
  Bytes(Vec<u8>),
  Int(i32),
  Str(String),
  Record(Record),
}

impl Value {
  pub fn as_bytes(&self) -> Option<&[u8]> {
    match self {
      Value::Bytes(b) => Some(b),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i32> {
    match self {
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Str(s) => Some(s),
      _ => None,
    }
  }
}

/// A schema-tagged record: a `messageType` discriminant plus an unordered
/// set of named fields. This is the only type the wire codec knows about;
/// it has no notion of `stdin`/`resize`/etc beyond the tag string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub message_type: String,
  fields: BTreeMap<String, Value>,
}

impl Record {
  pub fn new(message_type: impl Into<String>) -> Self {
    Self {
      message_type: message_type.into(),
      fields: BTreeMap::new(),
    }
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.fields.get(key)
  }

  pub fn set(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
    self.fields.insert(key.into(), value);
    self
  }

  pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
    self.set(key, value);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn get_set_round_trips_a_field() {
    let rec = Record::new("stdin")
      .with("processId", Value::Int(3))
      .with("bytes", Value::Bytes(b"hi".to_vec()));

    assert_eq!(rec.get("processId").and_then(Value::as_int), Some(3));
    assert_eq!(rec.get("bytes").and_then(Value::as_bytes), Some(&b"hi"[..]));
    assert_eq!(rec.get("missing"), None);
  }

  #[test]
  fn bincode_round_trip_is_structurally_identical() {
    let rec = Record::new("createProcess")
      .with("path", Value::Str("/bin/cat".into()))
      .with("rows", Value::Int(24))
      .with("cols", Value::Int(80));

    let bytes = bincode::serialize(&rec).expect("serialize");
    let decoded: Record = bincode::deserialize(&bytes).expect("deserialize");
    assert_eq!(rec, decoded);
  }
}
