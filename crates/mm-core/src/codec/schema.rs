//! Schema symbol table (SPEC_FULL.md §4.1, §9's "global mutable codec/schema
//! variables" redesign note). The reference design loads Avro schema files
//! from disk at startup and keys them by name; this crate's pluggable codec
//! doesn't need a byte-level schema description (the wire format is a plain
//! bincode encoding of [`super::Record`]), but it still keeps the set of
//! known schema names as an explicit, immutable value built once at startup
//! and threaded through, rather than a global.

use std::collections::BTreeSet;

use crate::error::SchemaLoadError;

/// Names of the schemas this server's protocol is built from.
pub const SCHEMA_NAMES: &[&str] = &[
  "InputOutput",
  "Resize",
  "CreateProcess",
  "AttachToProcess",
  "Message",
];

/// An immutable table of known schema names, constructed once at startup.
#[derive(Debug, Clone)]
pub struct SchemaTable {
  names: BTreeSet<&'static str>,
}

impl SchemaTable {
  /// Load the built-in schema table. Returns `SchemaLoadError` only in the
  /// (currently unreachable) case of a future on-disk schema source
  /// failing to read; kept fallible to match the spec's `SchemaLoadError`
  /// being a documented server-fatal startup error.
  pub fn load() -> Result<Self, SchemaLoadError> {
    Ok(Self {
      names: SCHEMA_NAMES.iter().copied().collect(),
    })
  }

  pub fn contains(&self, name: &str) -> bool {
    self.names.contains(name)
  }
}
