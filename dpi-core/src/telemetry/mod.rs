//! Orchestrator counters and the host-attribute lookup seam (§9 open
//! question: "host monitored" is an opaque external predicate here, not a
//! database this crate owns).

mod counters;
mod host_attribute;

pub use counters::{OrchestratorCounters, OrchestratorSnapshot};
pub use host_attribute::{AllHostsMonitored, HostAttributeLookup};
