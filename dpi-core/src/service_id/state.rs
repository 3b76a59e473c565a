//! Per-tuple service-identification state (§3, §4.6) and its confidence
//! dynamics.

use std::net::Ipv4Addr;
use std::time::Instant;

pub const VALID_COUNT_CAP: u8 = 5;
pub const INVALID_CLIENT_THRESHOLD: u16 = 9;
pub const DETRACT_THRESHOLD: u8 = 3;
/// Weight applied to `invalid_client_count` for an inconclusive in-process
/// failure at flow teardown (§4.7 `FailInProcess`) versus a plain
/// responder-side incompatible-data result.
pub const INCONCLUSIVE_WEIGHT: u16 = 3;
pub const INCOMPATIBLE_WEIGHT: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    New,
    Port,
    Pattern,
    BruteForce,
    Valid,
}

/// Validator identity, opaque to this module; the orchestrator interprets
/// it against its own registry.
pub type ValidatorId = u16;

#[derive(Debug, Clone)]
pub struct ServiceIdState {
    pub search_state: SearchState,
    pub winning_validator: Option<ValidatorId>,
    pub candidates: Vec<ValidatorId>,
    pub valid_count: u8,
    pub invalid_client_count: u16,
    pub detract_count: u8,
    pub last_peer_ip: Option<Ipv4Addr>,
    pub currently_searching: bool,
    pub reset_at: Instant,
}

impl ServiceIdState {
    pub fn new(now: Instant) -> Self {
        Self {
            search_state: SearchState::New,
            winning_validator: None,
            candidates: Vec::new(),
            valid_count: 0,
            invalid_client_count: 0,
            detract_count: 0,
            last_peer_ip: None,
            currently_searching: false,
            reset_at: now,
        }
    }

    fn reset(&mut self, now: Instant) {
        self.search_state = SearchState::New;
        self.winning_validator = None;
        self.candidates.clear();
        self.valid_count = 0;
        self.invalid_client_count = 0;
        self.detract_count = 0;
        self.currently_searching = false;
        self.reset_at = now;
    }

    /// A validator reported success. First success clears accumulated
    /// failure counts; `valid_count` caps at `VALID_COUNT_CAP`.
    pub fn record_valid(&mut self, validator: ValidatorId) {
        if self.valid_count == 0 {
            self.invalid_client_count = 0;
            self.detract_count = 0;
        }
        self.valid_count = (self.valid_count + 1).min(VALID_COUNT_CAP);
        self.winning_validator = Some(validator);
        self.search_state = SearchState::Valid;
    }

    /// Client-direction incompatible-data result, weighted per §4.6.
    /// `inconclusive` is true for an in-process flow-teardown failure
    /// (weight 3), false for a plain responder-side incompatible result
    /// (weight 1). Crossing the threshold resets the whole entry.
    pub fn record_invalid_client(&mut self, now: Instant, inconclusive: bool) {
        let weight = if inconclusive { INCONCLUSIVE_WEIGHT } else { INCOMPATIBLE_WEIGHT };
        self.invalid_client_count += weight;
        if self.invalid_client_count >= INVALID_CLIENT_THRESHOLD {
            self.reset(now);
        }
    }

    /// Server-side failure from `peer_ip`. A changed peer IP replaces the
    /// recorded one and restarts the detract count at 1; the same peer IP
    /// repeating past `DETRACT_THRESHOLD` either decrements `valid_count`
    /// (if it's still above 1) or resets the whole entry to `New`.
    pub fn record_server_failure(&mut self, now: Instant, peer_ip: Ipv4Addr) {
        if self.last_peer_ip != Some(peer_ip) {
            self.last_peer_ip = Some(peer_ip);
            self.detract_count = 1;
            return;
        }
        self.detract_count += 1;
        if self.detract_count >= DETRACT_THRESHOLD {
            if self.valid_count > 1 {
                self.valid_count -= 1;
                self.detract_count = 0;
            } else {
                self.reset(now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_success_clears_prior_failure_counts() {
        let now = Instant::now();
        let mut s = ServiceIdState::new(now);
        s.invalid_client_count = 5;
        s.detract_count = 2;
        s.record_valid(7);
        assert_eq!(s.invalid_client_count, 0);
        assert_eq!(s.detract_count, 0);
        assert_eq!(s.valid_count, 1);
        assert_eq!(s.search_state, SearchState::Valid);
    }

    #[test]
    fn valid_count_caps_at_five() {
        let now = Instant::now();
        let mut s = ServiceIdState::new(now);
        for _ in 0..10 {
            s.record_valid(1);
        }
        assert_eq!(s.valid_count, VALID_COUNT_CAP);
    }

    #[test]
    fn invalid_client_count_resets_state_at_threshold() {
        let now = Instant::now();
        let mut s = ServiceIdState::new(now);
        s.record_valid(1);
        s.record_invalid_client(now, true); // weight 3
        s.record_invalid_client(now, true); // weight 3, total 6
        assert_eq!(s.search_state, SearchState::Valid);
        s.record_invalid_client(now, true); // weight 3, total 9 -> reset
        assert_eq!(s.search_state, SearchState::New);
        assert_eq!(s.valid_count, 0);
    }

    #[test]
    fn detract_count_decrements_valid_count_when_above_one() {
        let now = Instant::now();
        let mut s = ServiceIdState::new(now);
        s.record_valid(1);
        s.record_valid(1);
        let peer = Ipv4Addr::new(203, 0, 113, 5);
        s.record_server_failure(now, peer);
        s.record_server_failure(now, peer);
        s.record_server_failure(now, peer);
        assert_eq!(s.valid_count, 1);
        assert_eq!(s.search_state, SearchState::Valid);
    }

    #[test]
    fn detract_count_resets_state_when_valid_count_is_one() {
        let now = Instant::now();
        let mut s = ServiceIdState::new(now);
        s.record_valid(1);
        let peer = Ipv4Addr::new(203, 0, 113, 5);
        s.record_server_failure(now, peer);
        s.record_server_failure(now, peer);
        s.record_server_failure(now, peer);
        assert_eq!(s.search_state, SearchState::New);
        assert_eq!(s.valid_count, 0);
    }

    #[test]
    fn changed_peer_ip_restarts_detract_count() {
        let now = Instant::now();
        let mut s = ServiceIdState::new(now);
        s.record_valid(1);
        s.record_valid(1);
        s.record_server_failure(now, Ipv4Addr::new(203, 0, 113, 5));
        s.record_server_failure(now, Ipv4Addr::new(203, 0, 113, 6));
        assert_eq!(s.detract_count, 1);
        assert_eq!(s.valid_count, 2);
    }
}
