//! The validator trait (§4.7, §9 design note): a tagged-union-friendly
//! trait rather than the source's function-pointer-plus-opaque-user-data
//! pattern. Each registered protocol module is a type implementing this
//! trait; its own fields carry whatever state it needs instead of a
//! `void*`.

use crate::flow::Flow;
use crate::service_id::ValidatorId;
use crate::wire::Proto;

/// Which direction of traffic a packet being scanned travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToServer,
    ToClient,
}

/// Per-packet result a validator reports back to the orchestrator (§4.7
/// step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorResult {
    /// This is definitely the validator's protocol.
    Success,
    /// Not enough data yet to decide either way; keep this validator in
    /// the candidate list for the next packet.
    InProcess,
    /// Definitely not this validator's protocol; drop it from the list.
    NotCompatible,
    /// No evidence either way on this packet specifically (distinct from
    /// `InProcess` only in that the source tracks them as separate
    /// counters); treated identically to `NotCompatible` for list
    /// bookkeeping purposes.
    NoMatch,
}

/// Fixed deployment parameters available to a validator's one-time setup,
/// grounded on `service_base.c`'s init call receiving the service-detection
/// module's shared config (§4.7 supplement).
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorContext {
    pub detection_level: u8,
}

/// A per-protocol validator (§4.7, §9). `init` runs once at registration,
/// not per-flow, matching the source's `service_base.c` lifecycle (build
/// any internal sub-tables once, at process start); `fini` runs once at
/// registry shutdown, matching the source's matching teardown call.
pub trait Validator: Send + Sync {
    fn id(&self) -> ValidatorId;
    fn name(&self) -> &'static str;
    fn ports(&self) -> &[(u16, Proto)];
    fn patterns(&self) -> &[&'static [u8]];
    fn scan(&self, flow: &mut Flow, dir: Direction, payload: &[u8]) -> ValidatorResult;
    fn reset(&self, flow: &mut Flow);

    /// Called once per process lifetime before any flow reaches this
    /// validator. Default no-op; override for validators that build their
    /// own pattern sub-tables or other one-time setup that can fail.
    fn init(&self, _ctx: &OrchestratorContext) -> crate::Result<()> {
        Ok(())
    }

    /// Called once at registry shutdown, after which no flow will reach
    /// this validator again. Default no-op; override to release any
    /// resources acquired in `init`.
    fn fini(&self) {}
}
