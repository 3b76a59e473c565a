//! Reconciler throughput counters: plain atomics, a cheap `snapshot()`, and
//! a Prometheus-text renderer for a bare-bones metrics endpoint served over
//! a plain TCP listener.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ReconcilerCounters {
    pub plain_forwarded: AtomicU64,
    pub reconciled: AtomicU64,
    pub bytes_forwarded: AtomicU64,
    pub dropped_malformed: AtomicU64,
    pub dropped_timeout: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcilerSnapshot {
    pub plain_forwarded: u64,
    pub reconciled: u64,
    pub bytes_forwarded: u64,
    pub dropped_malformed: u64,
    pub dropped_timeout: u64,
}

impl ReconcilerCounters {
    pub fn snapshot(&self) -> ReconcilerSnapshot {
        ReconcilerSnapshot {
            plain_forwarded: self.plain_forwarded.load(Ordering::Relaxed),
            reconciled: self.reconciled.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            dropped_malformed: self.dropped_malformed.load(Ordering::Relaxed),
            dropped_timeout: self.dropped_timeout.load(Ordering::Relaxed),
        }
    }

    pub fn to_prometheus(&self, prefix: &str) -> String {
        let s = self.snapshot();
        format!(
            "# HELP {p}_plain_forwarded_total Plain packets forwarded unchanged\n\
             # TYPE {p}_plain_forwarded_total counter\n\
             {p}_plain_forwarded_total {plain}\n\
             # HELP {p}_reconciled_total Data/report pairs reconciled\n\
             # TYPE {p}_reconciled_total counter\n\
             {p}_reconciled_total {reconciled}\n\
             # HELP {p}_bytes_forwarded_total Bytes of matched data packets forwarded\n\
             # TYPE {p}_bytes_forwarded_total counter\n\
             {p}_bytes_forwarded_total {bytes}\n\
             # HELP {p}_dropped_malformed_total Packets dropped for malformed wire data\n\
             # TYPE {p}_dropped_malformed_total counter\n\
             {p}_dropped_malformed_total {malformed}\n\
             # HELP {p}_dropped_timeout_total Stragglers dropped by the janitor sweep\n\
             # TYPE {p}_dropped_timeout_total counter\n\
             {p}_dropped_timeout_total {timeout}\n",
            p = prefix,
            plain = s.plain_forwarded,
            reconciled = s.reconciled,
            bytes = s.bytes_forwarded,
            malformed = s.dropped_malformed,
            timeout = s.dropped_timeout,
        )
    }
}
