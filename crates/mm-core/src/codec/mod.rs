//! C1: the codec adapter. See `record.rs` for the dynamic `Record`/`Value`
//! types the wire protocol is built from, `transport.rs` for the concrete
//! length-framed bincode encoding, and `schema.rs` for the (mostly
//! vestigial, since the wire format is self-describing) schema symbol table.

mod record;
mod schema;
mod transport;

pub use record::{Record, Value};
pub use schema::SchemaTable;
pub use transport::{DecodeHalf, EncodeHalf, Transport};
