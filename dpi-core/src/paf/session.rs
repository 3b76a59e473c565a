//! Per-direction PAF session state (§3). Created lazily on the first byte
//! of a reassembled TCP stream, one instance per direction.

pub const MAX_PIPELINE: u32 = 24;
/// Sentinel pipe value meaning "pipelining bookkeeping is no longer
/// trustworthy; stop tracking but keep scanning" (§4.3 Pipelining).
pub const PIPELINE_RUPTURED: u32 = u32::MAX;

/// Which end of a reassembled stream this session is watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    V0_9,
    V1_0,
    V1_1,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub request_seen: bool,
    pub response_seen: bool,
    pub length_known: bool,
    pub chunked: bool,
    pub no_body: bool,
    pub no_flush: bool,
    pub error_deferred: bool,
    pub get_seen: bool,
    pub post_seen: bool,
    pub eol_seen: bool,
}

/// One direction's running PAF state. `node` is the current FSM state id
/// (an index into the dense transition table, §4.3 FSM layout).
pub struct Session {
    pub direction: Direction,
    pub node: crate::paf::table::State,
    pub version: Option<HttpVersion>,
    /// Accumulated while scanning the three status-code digits (P2Code);
    /// consulted once, at P3Reason entry, to decide no-body classification.
    pub status_code: u16,
    pub length: u64,
    pub flags: Flags,
    pub nreq: u32,
    pub pipe: u32,
    pub last_scanned_seq: u64,
    pub last_flush_pos: u64,
    pub bytes_scanned: u64,
    pub aborted: bool,
    /// True while scanning optional trailer headers after a zero-length
    /// chunk, waiting for the blank line that really ends the message.
    pub in_chunk_trailer: bool,
    /// Pipeline depth at which `push_pipeline` ruptures the bitmap (§3,
    /// §4.3 "Pipelining"). Defaults to `MAX_PIPELINE` but is configurable
    /// per `config::PafConfig::max_pipeline`.
    max_pipeline: u32,
}

impl Session {
    pub fn new(direction: Direction) -> Self {
        Self::with_max_pipeline(direction, MAX_PIPELINE)
    }

    pub fn with_max_pipeline(direction: Direction, max_pipeline: u32) -> Self {
        let node = match direction {
            Direction::Request => crate::paf::table::State::Q0,
            Direction::Response => crate::paf::table::State::P0,
        };
        Self {
            direction,
            node,
            version: None,
            status_code: 0,
            length: 0,
            flags: Flags::default(),
            nreq: 0,
            pipe: 0,
            last_scanned_seq: 0,
            last_flush_pos: 0,
            bytes_scanned: 0,
            aborted: false,
            in_chunk_trailer: false,
            max_pipeline,
        }
    }

    /// Pushes a completed request onto the pipeline bitmap; `head` is true
    /// when the request method was HEAD (§4.3 Pipelining).
    pub fn push_pipeline(&mut self, head: bool) {
        if self.pipe == PIPELINE_RUPTURED {
            return;
        }
        if self.nreq >= self.max_pipeline {
            self.pipe = PIPELINE_RUPTURED;
            return;
        }
        if head {
            self.pipe |= 1 << self.nreq;
        }
        self.nreq += 1;
    }

    /// Pops the oldest queued request's HEAD-ness off the pipeline bitmap
    /// as its response completes.
    pub fn pop_pipeline(&mut self) -> bool {
        if self.pipe == PIPELINE_RUPTURED || self.nreq == 0 {
            return false;
        }
        let head = self.pipe & 1 != 0;
        self.pipe >>= 1;
        self.nreq -= 1;
        head
    }

    pub fn reset_for_next_message(&mut self, start_state: crate::paf::table::State) {
        self.node = start_state;
        self.version = None;
        self.status_code = 0;
        self.length = 0;
        self.flags.length_known = false;
        self.flags.chunked = false;
        self.flags.no_body = false;
        self.flags.no_flush = false;
        self.flags.get_seen = false;
        self.flags.post_seen = false;
        self.flags.eol_seen = false;
        self.in_chunk_trailer = false;
    }
}
