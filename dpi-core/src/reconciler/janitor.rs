//! The janitor pass (§4.2 step 4): peeks both queues from the head and, while
//! the head is older than `now - eviction_threshold`, dequeues and drops it.
//! Runs either as a dedicated sweep loop (below) or can be invoked
//! opportunistically per-packet by a caller that prefers not to spawn a
//! separate task.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::packet_buffer::PacketBuffer;
use crate::reconciler::metrics::ReconcilerCounters;

pub const DEFAULT_EVICTION_THRESHOLD: Duration = Duration::from_secs(10);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3);

/// One sweep over both buffers; returns the number of stragglers dropped.
pub fn sweep_once(
    data_queue: &PacketBuffer,
    match_queue: &PacketBuffer,
    eviction_threshold: Duration,
    counters: &ReconcilerCounters,
) -> usize {
    let now = std::time::Instant::now();
    let dropped_data = data_queue.evict_older_than(now, eviction_threshold);
    let dropped_match = match_queue.evict_older_than(now, eviction_threshold);
    let total = dropped_data + dropped_match;
    if total > 0 {
        counters.dropped_timeout.fetch_add(total as u64, std::sync::atomic::Ordering::Relaxed);
        debug!(dropped_data, dropped_match, "janitor sweep dropped stragglers");
    }
    total
}

/// Runs `sweep_once` on an interval until `shutdown` fires. Intended to run
/// as its own task, the only concurrent peer of the reconciler's capture
/// loop (§5).
pub async fn run(
    data_queue: Arc<PacketBuffer>,
    match_queue: Arc<PacketBuffer>,
    eviction_threshold: Duration,
    sweep_interval: Duration,
    counters: Arc<ReconcilerCounters>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(sweep_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep_once(&data_queue, &match_queue, eviction_threshold, &counters);
            }
            res = shutdown.changed() => {
                if res.is_ok() && *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
