//! Flow table (§3, §4.4): per-connection state keyed by the canonicalized
//! 7-tuple, parameterized by opaque per-protocol-module state slots.

pub mod key;
pub mod table;

pub use key::{Endpoint, FlowKey};
pub use table::FlowTable;

use std::any::Any;
use std::time::Instant;

/// Index assigned to a registered protocol module at startup; stable for
/// the process lifetime, used to address a flow's slot vector.
pub type ModuleId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Unknown,
    Identified(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Inspect,
    Ignore,
    Drop,
    Pass,
}

/// Per-connection record (§3 "Flow"). Module slots are lazily allocated,
/// owned exclusively by the producing module, and dropped (running that
/// type's `Drop`, the Rust analogue of a per-slot destructor) at flow
/// teardown along with the rest of the record.
pub struct Flow {
    pub key: FlowKey,
    pub initiator_is_a: bool,
    pub created_at: Instant,
    pub last_seen: Instant,
    pub protocol: Protocol,
    pub policy: Policy,
    /// True when this flow was picked up mid-stream (handshake missed):
    /// service-ID cache is consulted but detection stays advisory (§4.4).
    pub midstream: bool,
    /// Expiry bucket this flow is currently filed under in the flow
    /// table's sweep index; maintained by `table.rs`, not the flow itself.
    pub(crate) expire_bucket: u64,
    slots: Vec<Option<Box<dyn Any + Send + Sync>>>,
}

impl Flow {
    pub fn new(key: FlowKey, initiator_is_a: bool, now: Instant, midstream: bool) -> Self {
        Self {
            key,
            initiator_is_a,
            created_at: now,
            last_seen: now,
            protocol: Protocol::Unknown,
            policy: Policy::Inspect,
            midstream,
            expire_bucket: 0,
            slots: Vec::new(),
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }

    fn ensure_capacity(&mut self, module: ModuleId) {
        let idx = module as usize;
        if self.slots.len() <= idx {
            self.slots.resize_with(idx + 1, || None);
        }
    }

    pub fn slot<T: 'static>(&self, module: ModuleId) -> Option<&T> {
        self.slots.get(module as usize)?.as_ref()?.downcast_ref()
    }

    pub fn slot_mut<T: 'static>(&mut self, module: ModuleId) -> Option<&mut T> {
        self.slots.get_mut(module as usize)?.as_mut()?.downcast_mut()
    }

    pub fn set_slot<T: Any + Send + Sync>(&mut self, module: ModuleId, value: T) {
        self.ensure_capacity(module);
        self.slots[module as usize] = Some(Box::new(value));
    }

    pub fn clear_slot(&mut self, module: ModuleId) {
        if let Some(slot) = self.slots.get_mut(module as usize) {
            *slot = None;
        }
    }
}
