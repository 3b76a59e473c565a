//! The validator registry (§4.7 step 2): port-indexed and pattern-indexed
//! lookup tables built once from every registered `Validator`, plus the
//! detection-level-1 TLS-tunnel port remap.

use std::sync::Arc;

use ahash::AHashMap;

use crate::dispatch::{MultiPatternMatcher, NaiveMultiPatternMatcher, RuleId};
use crate::service_id::ValidatorId;
use crate::wire::Proto;

use super::validator::{OrchestratorContext, Validator};

/// Well-known TLS-tunnelled server ports remapped to their plain-protocol
/// equivalent at detection level 1 (§4.7).
pub const TLS_TUNNEL_REMAP: &[(u16, u16)] =
    &[(465, 25), (563, 119), (993, 143), (990, 21), (992, 23), (994, 6667), (995, 110)];

pub struct Registry {
    validators: Vec<Arc<dyn Validator>>,
    declaration_order: AHashMap<ValidatorId, usize>,
    by_port: AHashMap<(u16, Proto), Vec<ValidatorId>>,
    rule_owner: AHashMap<RuleId, ValidatorId>,
    rule_pattern_len: AHashMap<RuleId, usize>,
    needles: Vec<(RuleId, Vec<u8>)>,
    pattern_matcher: NaiveMultiPatternMatcher,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
            declaration_order: AHashMap::new(),
            by_port: AHashMap::new(),
            rule_owner: AHashMap::new(),
            rule_pattern_len: AHashMap::new(),
            needles: Vec::new(),
            pattern_matcher: NaiveMultiPatternMatcher::new(Vec::new()),
        }
    }

    /// Registers a validator, calling its one-time `init` and indexing its
    /// declared ports and patterns. Registration order is preserved as the
    /// tiebreaker for candidate ordering (§4.7 step 2). Propagates an
    /// `init` failure without indexing the validator.
    pub fn register(&mut self, validator: Arc<dyn Validator>, ctx: &OrchestratorContext) -> crate::Result<()> {
        validator.init(ctx)?;
        let order = self.validators.len();
        let id = validator.id();
        self.declaration_order.insert(id, order);

        for &(port, proto) in validator.ports() {
            self.by_port.entry((port, proto)).or_default().push(id);
        }

        for pattern in validator.patterns() {
            let rule_id = self.needles.len() as RuleId;
            self.rule_owner.insert(rule_id, id);
            self.rule_pattern_len.insert(rule_id, pattern.len());
            self.needles.push((rule_id, pattern.to_vec()));
        }
        self.pattern_matcher = NaiveMultiPatternMatcher::new(self.needles.clone());

        self.validators.push(validator);
        Ok(())
    }

    /// Calls every registered validator's `fini` once, in registration
    /// order. Invoked at process shutdown; no flow may reach this registry
    /// afterward.
    pub fn shutdown(&self) {
        for validator in &self.validators {
            validator.fini();
        }
    }

    pub fn get(&self, id: ValidatorId) -> Option<Arc<dyn Validator>> {
        self.declaration_order.get(&id).map(|&idx| self.validators[idx].clone())
    }

    pub fn declaration_order(&self, id: ValidatorId) -> usize {
        self.declaration_order.get(&id).copied().unwrap_or(usize::MAX)
    }

    pub fn by_port(&self, port: u16, proto: Proto) -> &[ValidatorId] {
        self.by_port.get(&(port, proto)).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Reverse/client-port lookup for UDP flows (§4.7 step 2, §4.7 retry
    /// discipline). UDP has no inherent client/server asymmetry the way a
    /// TCP handshake does, so a flow's *client* port can itself be a
    /// registered service port worth trying once the forward (server-port)
    /// lookup has been consulted. Backed by the same port index as
    /// `by_port` — a validator registered for port N is reachable whether
    /// N shows up as the flow's server port or its client port.
    pub fn by_client_port(&self, port: u16) -> &[ValidatorId] {
        self.by_port(port, Proto::Udp)
    }

    pub fn pattern_matcher(&self) -> &dyn MultiPatternMatcher {
        &self.pattern_matcher
    }

    pub fn rule_owner(&self, rule_id: RuleId) -> Option<&ValidatorId> {
        self.rule_owner.get(&rule_id)
    }

    pub fn rule_pattern_len(&self, rule_id: RuleId) -> usize {
        self.rule_pattern_len.get(&rule_id).copied().unwrap_or(0)
    }
}
