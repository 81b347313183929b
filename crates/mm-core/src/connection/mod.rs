mod handle;
mod registry;

pub use handle::{Connection, ConnectionId};
pub use registry::ConnectionRegistry;
