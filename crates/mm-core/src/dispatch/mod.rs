//! C6/C7: the inbound and outbound dispatchers. Both are realized as the
//! redesign described in SPEC_FULL.md §9: rather than a reflection-style
//! multi-source wait over a dynamically changing set of queues, every
//! entity's own task (a connection's decoder, a process's stdout-filler)
//! forwards directly onto one shared channel the dispatcher owns. The
//! dispatcher loop is then just `recv` in a loop.

mod inbound;
mod outbound;

pub use inbound::run_inbound;
pub use outbound::run_outbound;
