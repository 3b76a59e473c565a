//! Orchestrator throughput counters, grounded the same way as
//! `reconciler::metrics::ReconcilerCounters`: plain atomics plus a
//! Prometheus-text renderer.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct OrchestratorCounters {
    pub candidates_built: AtomicU64,
    pub validators_run: AtomicU64,
    pub detected: AtomicU64,
    pub unknown_protocol: AtomicU64,
    pub fail_in_process: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorSnapshot {
    pub candidates_built: u64,
    pub validators_run: u64,
    pub detected: u64,
    pub unknown_protocol: u64,
    pub fail_in_process: u64,
}

impl OrchestratorCounters {
    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            candidates_built: self.candidates_built.load(Ordering::Relaxed),
            validators_run: self.validators_run.load(Ordering::Relaxed),
            detected: self.detected.load(Ordering::Relaxed),
            unknown_protocol: self.unknown_protocol.load(Ordering::Relaxed),
            fail_in_process: self.fail_in_process.load(Ordering::Relaxed),
        }
    }

    pub fn to_prometheus(&self, prefix: &str) -> String {
        let s = self.snapshot();
        format!(
            "# HELP {p}_candidates_built_total Candidate lists built for a flow\n\
             # TYPE {p}_candidates_built_total counter\n\
             {p}_candidates_built_total {built}\n\
             # HELP {p}_validators_run_total Validator scan invocations\n\
             # TYPE {p}_validators_run_total counter\n\
             {p}_validators_run_total {run}\n\
             # HELP {p}_detected_total Flows with a successful protocol detection\n\
             # TYPE {p}_detected_total counter\n\
             {p}_detected_total {detected}\n\
             # HELP {p}_unknown_protocol_total Flows exhausted with no protocol match\n\
             # TYPE {p}_unknown_protocol_total counter\n\
             {p}_unknown_protocol_total {unknown}\n\
             # HELP {p}_fail_in_process_total In-progress detections failed by flow teardown\n\
             # TYPE {p}_fail_in_process_total counter\n\
             {p}_fail_in_process_total {fip}\n",
            p = prefix,
            built = s.candidates_built,
            run = s.validators_run,
            detected = s.detected,
            unknown = s.unknown_protocol,
            fip = s.fail_in_process,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn snapshot_reflects_recorded_counts() {
        let counters = OrchestratorCounters::default();
        counters.candidates_built.fetch_add(3, Ordering::Relaxed);
        counters.detected.fetch_add(1, Ordering::Relaxed);

        let snap = counters.snapshot();
        assert_eq!(snap.candidates_built, 3);
        assert_eq!(snap.detected, 1);
        assert_eq!(snap.unknown_protocol, 0);
    }

    #[test]
    fn prometheus_text_includes_the_prefix_and_all_five_series() {
        let counters = OrchestratorCounters::default();
        let text = counters.to_prometheus("dpi_orchestrator");
        for series in [
            "dpi_orchestrator_candidates_built_total",
            "dpi_orchestrator_validators_run_total",
            "dpi_orchestrator_detected_total",
            "dpi_orchestrator_unknown_protocol_total",
            "dpi_orchestrator_fail_in_process_total",
        ] {
            assert!(text.contains(series), "missing series {series}");
        }
    }
}
