//! Core library for a split deep-packet-inspection system: the
//! matched-data/data-packet reconciliation engine run at the egress
//! middlebox, the HTTP protocol-aware flushing state machine run at the
//! ingress side, and the service-detection orchestrator that converges on
//! a single application-protocol identification per flow.
//!
//! Packet capture itself, the inter-middlebox shared-memory interconnect,
//! rule-language parsing, and the Aho-Corasick/regex engine are external
//! collaborators (non-goals); this crate defines the trait seams they
//! plug into (`reconciler::capture::{CaptureSource, SendSink}`,
//! `dispatch::MultiPatternMatcher`) and provides a minimal in-tree
//! implementation of each, good enough for tests and a capture-free demo.

#![forbid(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod flow;
pub mod orchestrator;
pub mod packet_buffer;
pub mod paf;
pub mod reconciler;
pub mod service_id;
pub mod telemetry;
pub mod wire;

pub use error::{DpiError, Result};
