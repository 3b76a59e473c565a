//! HTTP Protocol-Aware Flushing (§4.3): a byte-at-a-time scanner over a
//! single direction of a reassembled TCP stream, producing flush/skip/
//! abort decisions a reassembly layer uses to hand complete messages to
//! pattern matching rather than re-scanning already-inspected bytes.

pub mod classes;
pub mod fsm;
pub mod session;
pub mod table;
pub mod wrapper;

pub use fsm::{Fsm, Outcome};
pub use session::{Direction, Session};
