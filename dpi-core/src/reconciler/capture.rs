//! The capture-handle / send-handle boundary (§1 non-goals: packet capture
//! itself is an external collaborator). `CaptureSource` and `SendSink` are
//! the seam a real `pcap`/`af_packet` backend plugs into; the in-memory
//! loopback implementation below exists for tests and for a capture-free
//! demo of the reconciler's pairing logic.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::BytesMut;
use tokio::sync::Notify;

/// A raw captured frame: link-layer bytes plus the time it was captured.
pub struct RawFrame {
    pub bytes: BytesMut,
    pub captured_at: std::time::Instant,
}

pub trait CaptureSource: Send {
    fn recv(&mut self) -> impl std::future::Future<Output = std::io::Result<RawFrame>> + Send;
}

pub trait SendSink: Send {
    fn send(&mut self, frame: &[u8]) -> impl std::future::Future<Output = std::io::Result<()>> + Send;
}

/// An in-memory capture source/sink pair, driven by pushing frames onto a
/// shared queue. Used by integration tests and by any deployment that
/// wants to drive the reconciler without a live NIC.
#[derive(Default)]
pub struct LoopbackMedium {
    inner: Mutex<VecDeque<RawFrame>>,
    notify: Notify,
}

impl LoopbackMedium {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self { inner: Mutex::new(VecDeque::new()), notify: Notify::new() })
    }

    pub fn push(&self, bytes: BytesMut) {
        self.inner
            .lock()
            .expect("loopback medium lock poisoned")
            .push_back(RawFrame { bytes, captured_at: std::time::Instant::now() });
        self.notify.notify_one();
    }
}

pub struct LoopbackSource {
    pub medium: std::sync::Arc<LoopbackMedium>,
}

impl CaptureSource for LoopbackSource {
    async fn recv(&mut self) -> std::io::Result<RawFrame> {
        loop {
            if let Some(frame) = self.medium.inner.lock().expect("loopback medium lock poisoned").pop_front() {
                return Ok(frame);
            }
            self.medium.notify.notified().await;
        }
    }
}

/// Collects every frame sent, for assertion in tests.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: std::sync::Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { sent: std::sync::Arc::new(Mutex::new(Vec::new())) }
    }
}

impl SendSink for RecordingSink {
    async fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.sent.lock().expect("recording sink lock poisoned").push(frame.to_vec());
        Ok(())
    }
}
