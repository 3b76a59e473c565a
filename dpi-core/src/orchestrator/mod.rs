//! Service-detection orchestrator (§4.7): drives a ranked set of candidate
//! protocol validators against each direction of a flow whose application
//! protocol is unknown, converging on a single identification cached per
//! `{server-ip, server-port, protocol}` tuple (§4.6) for future flows.

pub mod registry;
pub mod validator;

pub use registry::{Registry, TLS_TUNNEL_REMAP};
pub use validator::{Direction, OrchestratorContext, Validator, ValidatorResult};

use std::net::Ipv4Addr;

use crate::flow::{Flow, ModuleId};
use crate::service_id::{SearchState, ServiceIdCache, ServiceIdKey, ValidatorId};
use crate::wire::Proto;

/// Per-flow module slot this orchestrator claims (§3 "opaque per-protocol-
/// module state slots"). A real deployment assigns module IDs at
/// registration time; the orchestrator's own bookkeeping claims a fixed
/// low ID since it runs before any protocol module's own slot is used.
pub const ORCHESTRATOR_MODULE_ID: ModuleId = 0;

/// §3 "Candidate-services list (per flow, transient)": bounded to 10.
pub const MAX_CANDIDATES: usize = 10;

/// §4.7 supplement: caps how many packets a validator may sit in
/// `InProcess` before the orchestrator force-drops it even with a
/// non-empty candidate list, grounded on the source's `fwAppIdSearch`
/// timeout-check convention (`MAX_IN_PROCESS_ATTEMPTS` in `fw_appid.h`).
pub const MAX_IN_PROCESS_ATTEMPTS: u32 = 32;

/// Final outcome of running the orchestrator against one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// Still searching; try again on the next packet.
    InProgress,
    /// A validator won; `ValidatorId` identifies it.
    Detected(ValidatorId),
    /// Candidate list exhausted at `BruteForce`: flow is marked detected
    /// with unknown protocol and the orchestrator stops trying.
    UnknownProtocol,
}

/// Per-flow transient state the orchestrator owns (§3 Candidate-services
/// list): the current candidate list and per-validator attempt counts.
/// Stored in the flow's module slot at `ORCHESTRATOR_MODULE_ID`.
#[derive(Debug, Default, Clone)]
pub struct FlowState {
    pub candidates: Vec<ValidatorId>,
    attempts: std::collections::HashMap<ValidatorId, u32>,
    pub tried_reverse_service: bool,
    pub built: bool,
}

/// Drives candidate validators for a flow whose protocol is unknown
/// (§4.7). Holds the validator registry and a handle to the shared
/// service-ID cache; stateless otherwise — all per-flow state lives in the
/// flow's own `FlowState` slot, all per-tuple state lives in the cache.
pub struct Orchestrator {
    registry: Registry,
    cache: ServiceIdCache,
    detection_level: u8,
}

impl Orchestrator {
    pub fn new(registry: Registry, cache: ServiceIdCache, detection_level: u8) -> Self {
        Self { registry, cache, detection_level }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cache(&self) -> &ServiceIdCache {
        &self.cache
    }

    /// Runs every registered validator's `fini` once (§4.7 supplement).
    /// Call at process shutdown; no flow may run through this orchestrator
    /// afterward.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }

    fn flow_state<'a>(flow: &'a mut Flow) -> &'a mut FlowState {
        if flow.slot::<FlowState>(ORCHESTRATOR_MODULE_ID).is_none() {
            flow.set_slot(ORCHESTRATOR_MODULE_ID, FlowState::default());
        }
        flow.slot_mut::<FlowState>(ORCHESTRATOR_MODULE_ID).expect("just inserted")
    }

    /// §4.7 step 2: builds the candidate list for a flow on first use.
    /// Drawn from port-indexed lists (both forward, and for UDP the
    /// reverse-service shortcut keyed by the flow's own client port), the
    /// pattern-match-indexed list scored against `payload`, and the
    /// detection-level-1 TLS-tunnel remap. Ordered by (hit count desc,
    /// pattern length desc, declaration order), capped at
    /// `MAX_CANDIDATES`. Sets `tried_reverse_service` on `fs` for UDP
    /// flows so the reverse lookup is never repeated for this flow (§4.7
    /// retry discipline) — this is the only place it's consulted, since
    /// the candidate list itself is only ever built once per flow.
    fn build_candidates(
        &self,
        server_port: u16,
        client_port: u16,
        proto: Proto,
        payload: &[u8],
        fs: &mut FlowState,
    ) -> Vec<ValidatorId> {
        let mut scored: Vec<(ValidatorId, u32, usize, usize)> = Vec::new(); // (id, hits, max_pattern_len, decl_order)
        let mut seen = std::collections::HashSet::new();

        let remapped_port = if self.detection_level >= 1 {
            TLS_TUNNEL_REMAP.iter().find(|(tunnel, _)| *tunnel == server_port).map(|(_, plain)| *plain)
        } else {
            None
        };

        for port in [Some(server_port), remapped_port].into_iter().flatten() {
            for &id in self.registry.by_port(port, proto) {
                if seen.insert(id) {
                    scored.push((id, 0, 0, self.registry.declaration_order(id)));
                }
            }
        }

        if proto == Proto::Udp && !fs.tried_reverse_service {
            for &id in self.registry.by_client_port(client_port) {
                if seen.insert(id) {
                    scored.push((id, 0, 0, self.registry.declaration_order(id)));
                }
            }
            fs.tried_reverse_service = true;
        }

        let mut hit_counts: std::collections::HashMap<ValidatorId, (u32, usize)> = std::collections::HashMap::new();
        self.registry.pattern_matcher().scan(payload, &mut |rule_id, _offset| {
            if let Some(&validator) = self.registry.rule_owner(rule_id) {
                let len = self.registry.rule_pattern_len(rule_id);
                let entry = hit_counts.entry(validator).or_insert((0, 0));
                entry.0 += 1;
                entry.1 = entry.1.max(len);
            }
            false
        });

        for (id, (hits, max_len)) in &hit_counts {
            if seen.insert(*id) {
                scored.push((*id, *hits, *max_len, self.registry.declaration_order(*id)));
            } else if let Some(slot) = scored.iter_mut().find(|(existing, ..)| existing == id) {
                slot.1 = slot.1.max(*hits);
                slot.2 = slot.2.max(*max_len);
            }
        }

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.3.cmp(&b.3)));
        scored.into_iter().map(|(id, ..)| id).take(MAX_CANDIDATES).collect()
    }

    /// §4.7: run every candidate validator in the flow's list against one
    /// packet, advancing the service-ID cache's search state and
    /// confidence counters as validators report in.
    #[allow(clippy::too_many_arguments)]
    pub fn run_packet(
        &self,
        flow: &mut Flow,
        server_ip: Ipv4Addr,
        server_port: u16,
        client_port: u16,
        proto: Proto,
        peer_ip: Ipv4Addr,
        direction: Direction,
        payload: &[u8],
        now: std::time::Instant,
    ) -> DetectionOutcome {
        let key = ServiceIdKey { server_ip, server_port, protocol: proto, detection_level: self.detection_level };

        // §4.7 step 1: an already-`Valid` tuple runs only its cached winner.
        let cached_winner = {
            let state = self.cache.get_or_insert(key, now);
            if state.search_state == SearchState::Valid {
                state.winning_validator
            } else {
                None
            }
        };
        if let Some(winner) = cached_winner {
            return self.run_single(flow, winner, direction, payload, &key, peer_ip, now);
        }

        {
            let mut state = self.cache.get_or_insert(key, now);
            if state.search_state == SearchState::New {
                state.search_state = SearchState::Port;
            }
        }

        // §4.7 step 2: build the candidate list once per flow.
        {
            let fs = Self::flow_state(flow);
            if !fs.built {
                let candidates = self.build_candidates(server_port, client_port, proto, payload, fs);
                fs.candidates = candidates;
                fs.built = true;
                let mut state = self.cache.get_or_insert(key, now);
                state.candidates = fs.candidates.clone();
                state.search_state = if fs.candidates.is_empty() { SearchState::BruteForce } else { SearchState::Pattern };
            }
        }

        // §4.7 step 3: run every remaining candidate this packet.
        let candidates = Self::flow_state(flow).candidates.clone();
        let mut winner = None;
        let mut survivors = Vec::with_capacity(candidates.len());
        for id in candidates {
            let result = match self.registry.get(id) {
                Some(validator) => validator.scan(flow, direction, payload),
                None => ValidatorResult::NotCompatible,
            };

            let attempts_exhausted = {
                let fs = Self::flow_state(flow);
                if result == ValidatorResult::InProcess {
                    let count = fs.attempts.entry(id).or_insert(0);
                    *count += 1;
                    *count > MAX_IN_PROCESS_ATTEMPTS
                } else {
                    false
                }
            };

            match result {
                ValidatorResult::Success => {
                    winner = Some(id);
                    break;
                }
                ValidatorResult::InProcess if !attempts_exhausted => survivors.push(id),
                ValidatorResult::InProcess | ValidatorResult::NotCompatible | ValidatorResult::NoMatch => {
                    if matches!(result, ValidatorResult::NotCompatible) && direction == Direction::ToServer {
                        let mut state = self.cache.get_or_insert(key, now);
                        state.record_invalid_client(now, false);
                    }
                }
            }
        }

        if let Some(winner_id) = winner {
            Self::flow_state(flow).candidates.clear();
            let mut state = self.cache.get_or_insert(key, now);
            state.record_valid(winner_id);
            return DetectionOutcome::Detected(winner_id);
        }

        Self::flow_state(flow).candidates = survivors;
        let empty = Self::flow_state(flow).candidates.is_empty();

        if empty {
            // §4.7 step 4: the candidate list ran dry. Whether it started
            // empty (no port/pattern match at all) or was whittled down to
            // nothing by this packet, there is nothing left to try.
            let mut state = self.cache.get_or_insert(key, now);
            state.search_state = SearchState::BruteForce;
            return DetectionOutcome::UnknownProtocol;
        }

        DetectionOutcome::InProgress
    }

    fn run_single(
        &self,
        flow: &mut Flow,
        winner: ValidatorId,
        direction: Direction,
        payload: &[u8],
        key: &ServiceIdKey,
        peer_ip: Ipv4Addr,
        now: std::time::Instant,
    ) -> DetectionOutcome {
        let Some(validator) = self.registry.get(winner) else {
            return DetectionOutcome::UnknownProtocol;
        };
        match validator.scan(flow, direction, payload) {
            ValidatorResult::Success => {
                let mut state = self.cache.get_or_insert(*key, now);
                state.record_valid(winner);
                DetectionOutcome::Detected(winner)
            }
            ValidatorResult::InProcess => DetectionOutcome::InProgress,
            ValidatorResult::NotCompatible => {
                let mut state = self.cache.get_or_insert(*key, now);
                state.record_server_failure(now, peer_ip);
                DetectionOutcome::InProgress
            }
            ValidatorResult::NoMatch => DetectionOutcome::InProgress,
        }
    }

    /// §4.7 `FailInProcess`: invoked on flow teardown before detection
    /// completed. Treats the in-process validator as contributing an
    /// inconclusive-service weight to `invalid_client_count` and applies
    /// the demotion rules (§4.6).
    pub fn fail_in_process(&self, key: ServiceIdKey, now: std::time::Instant) {
        let mut state = self.cache.get_or_insert(key, now);
        if state.search_state != SearchState::Valid {
            state.record_invalid_client(now, true);
        }
    }
}

/// `FlowTable::sweep`'s `ExpiryHook` (§4.4): forces any in-progress
/// detection attempt for an expiring flow to fail, so the next flow to
/// the same tuple doesn't indefinitely retry a stuck detector.
pub struct OrchestratorExpiryHook<'a> {
    pub orchestrator: &'a Orchestrator,
    pub detection_level: u8,
}

impl crate::flow::table::ExpiryHook for OrchestratorExpiryHook<'_> {
    fn on_expire(&self, flow: &Flow) {
        if flow.protocol == crate::flow::Protocol::Unknown {
            let key = ServiceIdKey {
                server_ip: flow.key.b.ip,
                server_port: flow.key.b.port,
                protocol: flow.key.protocol,
                detection_level: self.detection_level,
            };
            self.orchestrator.fail_in_process(key, std::time::Instant::now());
        }
    }
}
