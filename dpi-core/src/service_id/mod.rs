//! Service-ID state cache (§3, §4.6): per `{server-ip, server-port,
//! protocol, detection-level}` tuple, holding the last winning validator,
//! strike counts, search mode, and a cached candidate ordering.

pub mod cache;
pub mod state;

pub use cache::{ServiceIdCache, ServiceIdKey};
pub use state::{SearchState, ServiceIdState, ValidatorId};
