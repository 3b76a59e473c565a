//! Seed scenario 3: a sideband report with no matching data packet is
//! dropped by the janitor sweep once it's older than the pairing timeout,
//! and the match queue returns to empty with no output forwarded for it.

use std::time::{Duration, Instant};

use dpi_core::reconciler::janitor::sweep_once;
use dpi_core::reconciler::metrics::ReconcilerCounters;
use dpi_core::wire::{FiveTuple, PacketEnvelope, Proto};

fn sideband_tuple() -> FiveTuple {
    FiveTuple {
        src_ip: "10.0.0.3".parse().unwrap(),
        dst_ip: "10.0.0.4".parse().unwrap(),
        src_port: 9999,
        dst_port: 9999,
        proto: Proto::Udp,
    }
}

#[test]
fn stale_sideband_only_report_is_swept_after_the_pairing_timeout() {
    use dpi_core::packet_buffer::PacketBuffer;

    let match_queue = PacketBuffer::new();
    let data_queue = PacketBuffer::new();

    let arrived_at = Instant::now() - Duration::from_secs(11);
    match_queue.enqueue(PacketEnvelope::synthetic(sideband_tuple(), 0x0000_1000, arrived_at));
    assert_eq!(match_queue.len(), 1);

    let counters = ReconcilerCounters::default();
    let dropped = sweep_once(&data_queue, &match_queue, Duration::from_secs(10), &counters);

    assert_eq!(dropped, 1);
    assert_eq!(match_queue.len(), 0);
    assert_eq!(counters.snapshot().dropped_timeout, 1);
}
