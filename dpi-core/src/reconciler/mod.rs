//! Reconciler (§4.2): pairs data packets carrying the "has-matches" TOS
//! flag with the sideband UDP match-report packet describing them, and
//! forwards the reconciled pair — evidence attached or scrubbed, depending
//! on whether this middlebox is the terminal hop on the match-reporting
//! path.

pub mod capture;
pub mod janitor;
pub mod metrics;

use capture::{CaptureSource, SendSink};
use metrics::ReconcilerCounters;

use crate::packet_buffer::PacketBuffer;
use crate::wire::{PacketEnvelope, SidebandPacket};

/// Bound on the per-report array copied out of a sideband payload in
/// `handle_matches` (§4.2.a).
pub const MAX_REPORTS_PER_PACKET: usize = 65_535;

/// Sink for the `{rule-id, start-index}` pairs `handle_matches` copies out
/// of a reconciled sideband report (§4.2.a). This is the boundary to the
/// rule-option-tree / attribute lookup the report ultimately feeds — both
/// explicit non-goals (§1) — so the reconciler only hands matches off here
/// rather than interpreting them itself.
pub trait MatchObserver: Send + Sync {
    fn observe(&self, rule_id: u16, start_index: i16);
}

/// Default observer: discards every match. Used whenever a deployment (or a
/// test that only cares about forwarding behavior) has no rule-option-tree
/// wired up yet.
#[derive(Debug, Default)]
pub struct NullMatchObserver;

impl MatchObserver for NullMatchObserver {
    fn observe(&self, _rule_id: u16, _start_index: i16) {}
}

pub struct Reconciler {
    data_queue: PacketBuffer,
    match_queue: PacketBuffer,
    counters: ReconcilerCounters,
    /// True when this instance is the last hop on the match-reporting path,
    /// i.e. the one responsible for scrubbing the TOS evidence flag and
    /// swallowing the sideband report rather than forwarding it.
    terminal_hop: bool,
    observer: Box<dyn MatchObserver>,
}

impl Reconciler {
    pub fn new(terminal_hop: bool) -> Self {
        Self::with_observer(terminal_hop, Box::new(NullMatchObserver))
    }

    pub fn with_observer(terminal_hop: bool, observer: Box<dyn MatchObserver>) -> Self {
        Self {
            data_queue: PacketBuffer::new(),
            match_queue: PacketBuffer::new(),
            counters: ReconcilerCounters::default(),
            terminal_hop,
            observer,
        }
    }

    pub fn counters(&self) -> &ReconcilerCounters {
        &self.counters
    }

    pub fn data_queue(&self) -> &PacketBuffer {
        &self.data_queue
    }

    pub fn match_queue(&self) -> &PacketBuffer {
        &self.match_queue
    }

    /// Runs the capture -> classify -> dispatch loop until the source
    /// returns an I/O error or is told to stop externally. Capture errors
    /// are fatal (§4.2 failure semantics); the caller decides shutdown via
    /// dropping the source or via a separate signal path in the binary.
    pub async fn run<C, S>(&self, mut source: C, mut sink: S) -> std::io::Result<()>
    where
        C: CaptureSource,
        S: SendSink,
    {
        loop {
            let frame = source.recv().await?;
            self.handle_frame(frame.bytes, frame.captured_at, &mut sink).await?;
        }
    }

    async fn handle_frame<S: SendSink>(
        &self,
        raw: bytes::BytesMut,
        captured_at: std::time::Instant,
        sink: &mut S,
    ) -> std::io::Result<()> {
        let packet = match PacketEnvelope::parse(raw, captured_at) {
            Ok(p) => p,
            Err(_) => {
                self.counters.dropped_malformed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return Ok(());
            }
        };
        self.dispatch(packet, sink).await
    }

    async fn dispatch<S: SendSink>(&self, packet: PacketEnvelope, sink: &mut S) -> std::io::Result<()> {
        use crate::wire::Proto;
        use std::sync::atomic::Ordering;

        let is_sideband =
            packet.five_tuple.proto == Proto::Udp && SidebandPacket::looks_like_sideband(packet.payload());

        if is_sideband {
            let report = match SidebandPacket::decode(packet.payload()) {
                Ok(r) => r,
                Err(_) => {
                    self.counters.dropped_malformed.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
            };
            match self.data_queue.pop_by_seq(report.flow_seq_key) {
                Some(data_packet) => {
                    self.handle_matches(data_packet, &report, sink).await?;
                }
                None => {
                    self.match_queue.enqueue(packet);
                }
            }
            return Ok(());
        }

        if packet.has_matches() {
            match self.match_queue.pop_by_seq(packet.seq_key) {
                Some(report_packet) => {
                    let report = match SidebandPacket::decode(report_packet.payload()) {
                        Ok(r) => r,
                        Err(_) => {
                            self.counters.dropped_malformed.fetch_add(1, Ordering::Relaxed);
                            return Ok(());
                        }
                    };
                    self.handle_matches(packet, &report, sink).await?;
                }
                None => {
                    self.data_queue.enqueue(packet);
                }
            }
            return Ok(());
        }

        let len = packet.payload().len() as u64;
        sink.send(&packet.into_raw()).await?;
        self.counters.plain_forwarded.fetch_add(1, Ordering::Relaxed);
        self.counters.bytes_forwarded.fetch_add(len, Ordering::Relaxed);
        Ok(())
    }

    /// §4.2.a: reconcile a matched data packet with its sideband report.
    async fn handle_matches<S: SendSink>(
        &self,
        mut data_packet: PacketEnvelope,
        report: &SidebandPacket,
        sink: &mut S,
    ) -> std::io::Result<()> {
        use std::sync::atomic::Ordering;

        // Reports beyond capacity are silently dropped from the copied
        // array; the data packet is still reconciled and forwarded.
        for r in report.reports.iter().take(MAX_REPORTS_PER_PACKET) {
            self.observer.observe(r.rule_id, r.start_index);
        }

        self.counters.bytes_forwarded.fetch_add(data_packet.payload().len() as u64, Ordering::Relaxed);
        self.counters.reconciled.fetch_add(1, Ordering::Relaxed);

        if self.terminal_hop {
            data_packet.clear_matches_flag();
        }

        sink.send(&data_packet.into_raw()).await?;

        if !self.terminal_hop {
            sink.send(&report.encode()).await?;
        }

        Ok(())
    }
}
