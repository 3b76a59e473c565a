//! The byte-at-a-time scanner (§4.3): drives the line wrapper and the
//! dense transition table, executes actions against per-direction
//! session state, and applies the end-of-headers policy to decide one of
//! four outcomes per byte: continue, flush, skip, or abort.

use crate::paf::session::{Direction, HttpVersion, Session};
use crate::paf::table::{self, Action, State};
use crate::paf::wrapper::{LineWrapper, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    FlushAt(u64),
    SkipTo(u64),
    Abort,
}

/// Status codes classified as having no body regardless of any
/// `Content-Length` header present (§4.3 Response prefix side effects).
/// 100 is excluded: it's an interim response with its own end-of-headers
/// handling that continues scanning for the real final status line rather
/// than flushing here.
fn is_no_body_status(code: u16) -> bool {
    ((101..200).contains(&code)) || code == 204 || code == 304
}

pub struct Fsm {
    pub session: Session,
    wrapper: LineWrapper,
    byte_budget: Option<u64>,
    method_scratch: Vec<u8>,
    /// The most recently classified request method, set once when
    /// `method_scratch` is consumed on `Q0` exit and left in place until
    /// the next request line starts — unlike `method_scratch`, this
    /// survives to `end_of_headers`, which is the only place that needs
    /// to know whether the request just completed was a `HEAD`.
    last_method: Vec<u8>,
}

impl Fsm {
    pub fn new(direction: Direction, byte_budget: Option<u64>) -> Self {
        Self {
            session: Session::new(direction),
            wrapper: LineWrapper::new(),
            byte_budget,
            method_scratch: Vec::with_capacity(8),
            last_method: Vec::with_capacity(8),
        }
    }

    /// As `new`, but threads a deployment's configured pipeline depth
    /// (`config::PafConfig::max_pipeline`) through to the session instead
    /// of the hardcoded `session::MAX_PIPELINE` default.
    pub fn with_max_pipeline(direction: Direction, byte_budget: Option<u64>, max_pipeline: u32) -> Self {
        Self {
            session: Session::with_max_pipeline(direction, max_pipeline),
            wrapper: LineWrapper::new(),
            byte_budget,
            method_scratch: Vec::with_capacity(8),
            last_method: Vec::with_capacity(8),
        }
    }

    /// Feeds one raw byte (CR included) and returns this byte's outcome.
    pub fn feed(&mut self, byte: u8) -> Outcome {
        if self.session.aborted {
            return Outcome::Abort;
        }
        self.session.bytes_scanned += 1;
        if self.over_budget() {
            return Outcome::Abort;
        }

        let simple_request_legal = matches!(self.session.node, State::Q0 | State::Q1Uri | State::Q2VersionLit(_));
        match self.wrapper.feed(byte, simple_request_legal) {
            Some(tok) => self.apply_token(tok),
            None => Outcome::Continue,
        }
    }

    /// Feeds a whole buffer, taking the memchr fast path over runs where
    /// the FSM sits in the skip-to-EOL sink (§4.3 fast-path optimization)
    /// instead of visiting every byte through `feed`. Stops and returns
    /// the first non-`Continue` outcome, leaving the rest of `data` unread
    /// by the caller (mirrors per-byte `feed` semantics for flush/skip/
    /// abort, which likewise hand control back to the reassembly layer).
    pub fn feed_slice(&mut self, data: &[u8]) -> Outcome {
        let mut offset = 0;
        while offset < data.len() {
            if self.session.node == State::R8SkipToEol {
                let remaining = &data[offset..];
                match memchr::memchr(b'\n', remaining) {
                    Some(pos) => {
                        let consumed = pos + 1;
                        self.session.bytes_scanned += consumed as u64;
                        if self.over_budget() {
                            return Outcome::Abort;
                        }
                        self.wrapper.mark_line_ended();
                        offset += consumed;
                        let outcome = self.step(b'\n');
                        if !matches!(outcome, Outcome::Continue) {
                            return outcome;
                        }
                    }
                    None => {
                        self.session.bytes_scanned += remaining.len() as u64;
                        if self.over_budget() {
                            return Outcome::Abort;
                        }
                        return Outcome::Continue;
                    }
                }
            } else {
                let outcome = self.feed(data[offset]);
                offset += 1;
                if !matches!(outcome, Outcome::Continue) {
                    return outcome;
                }
            }
        }
        Outcome::Continue
    }

    fn over_budget(&mut self) -> bool {
        match self.byte_budget {
            Some(budget) if self.session.bytes_scanned > budget => {
                self.session.aborted = true;
                true
            }
            _ => false,
        }
    }

    fn apply_token(&mut self, token: Token) -> Outcome {
        match token {
            Token::Byte(b) => self.step(b),
            Token::Lws => Outcome::Continue,
            Token::Eol => self.step(b'\n'),
            Token::EndOfHeaders => self.end_of_headers(),
        }
    }

    fn step(&mut self, byte: u8) -> Outcome {
        let old_state = self.session.node;

        if old_state == State::Q0 {
            if byte.is_ascii_alphabetic() && self.method_scratch.len() < self.method_scratch.capacity() {
                self.method_scratch.push(byte);
            }
        }

        let entry = table::transition(old_state, byte);
        self.run_action(old_state, entry.action, byte);

        self.session.node = match entry.action {
            Action::SawRequestLine | Action::SawResponseDone => State::R2HeaderStart,
            Action::ChunkLengthKnown => State::R6ChunkLenHex,
            _ => entry.next,
        };

        if old_state == State::Q0 && self.session.node != State::Q0 {
            self.classify_method();
        }

        // `Action::Nop` landing in `State::Done` is the P0/Q0 reject path
        // (prefix doesn't look like HTTP at all): the request/response-line
        // and chunk-length completions above already remap `Done` to a
        // live state, so anything still sitting here is a genuine abort.
        if self.session.node == State::Done && matches!(entry.action, Action::Nop) {
            self.session.aborted = true;
            return Outcome::Abort;
        }

        match entry.action {
            Action::ChunkLengthKnown if self.session.length == 0 => {
                // A zero-length chunk opens the (possibly empty) trailer
                // section; the message isn't done until its blank line.
                self.session.in_chunk_trailer = true;
                self.session.node = State::R2HeaderStart;
                Outcome::Continue
            }
            Action::ChunkLengthKnown => {
                // Skip past the chunk data and its trailing CRLF in one
                // bound jump; scanning resumes at the next chunk-size line.
                let skip_to = self.session.bytes_scanned + self.session.length + 2;
                self.session.length = 0;
                Outcome::SkipTo(skip_to)
            }
            _ => Outcome::Continue,
        }
    }

    fn classify_method(&mut self) {
        match self.method_scratch.as_slice() {
            b"GET" => self.session.flags.get_seen = true,
            b"POST" => self.session.flags.post_seen = true,
            _ => {}
        }
        self.last_method.clear();
        self.last_method.extend_from_slice(&self.method_scratch);
        self.method_scratch.clear();
    }

    fn run_action(&mut self, old_state: State, action: Action, byte: u8) {
        match action {
            Action::Nop => {}
            Action::NoBodyOnResponse => self.session.flags.no_body = true,
            Action::GetMethod => self.session.flags.get_seen = true,
            Action::PostMethod => self.session.flags.post_seen = true,
            Action::SawV09 => self.session.version = Some(HttpVersion::V0_9),
            Action::SawV10 => self.session.version = Some(HttpVersion::V1_0),
            Action::SawV11 => self.session.version = Some(HttpVersion::V1_1),
            Action::SawRequestLine => self.session.flags.request_seen = true,
            Action::SawRequestDone => {}
            Action::SawResponseDone => self.session.flags.response_seen = true,
            Action::ShiftIntoDecimal => {
                let digit = (byte - b'0') as u64;
                let target = match old_state {
                    State::P2Code(_) => &mut self.session.status_code,
                    _ => {
                        self.shift_length_decimal(digit);
                        return;
                    }
                };
                *target = target.saturating_mul(10).saturating_add(digit as u16);
                if old_state == State::P2Code(2) {
                    self.session.flags.no_body = is_no_body_status(self.session.status_code);
                }
            }
            Action::ShiftIntoHex => {
                let digit = (byte as char).to_digit(16).unwrap_or(0) as u64;
                self.session.length = self.session.length.saturating_mul(16).saturating_add(digit);
            }
            Action::LengthKnown => self.session.flags.length_known = true,
            Action::ChunkLengthKnown => {}
            Action::ClearLength => {
                self.session.length = 0;
                self.session.flags.length_known = false;
            }
            Action::Chunked => self.session.flags.chunked = true,
            Action::ClearChunkState => self.session.length = 0,
            Action::HeaderKeyword => {}
        }
    }

    fn shift_length_decimal(&mut self, digit: u64) {
        match self.session.length.checked_mul(10).and_then(|v| v.checked_add(digit)) {
            Some(v) => self.session.length = v,
            None => self.session.flags.error_deferred = true,
        }
    }

    /// Each direction restarts its own prefix state (Q0 for requests, P0
    /// for responses) once a message boundary flushes — a reassembled
    /// stream keeps running through this same `Fsm` for every pipelined
    /// message, so the FSM itself (not some external caller) must rewind
    /// for the next one.
    fn start_state(&self) -> State {
        match self.session.direction {
            crate::paf::session::Direction::Request => State::Q0,
            crate::paf::session::Direction::Response => State::P0,
        }
    }

    /// §4.3 End-of-headers policy.
    fn end_of_headers(&mut self) -> Outcome {
        if self.session.in_chunk_trailer {
            self.session.in_chunk_trailer = false;
            let flush_at = self.session.bytes_scanned;
            self.session.reset_for_next_message(self.start_state());
            return Outcome::FlushAt(flush_at);
        }

        // A legal simple-request (or any stream whose prefix never
        // completed a version match) reaches end-of-headers without ever
        // running the request/response-line action that would normally
        // record it; back-fill that here so the flush decision below sees
        // a recognized message rather than falling through to abort.
        if self.session.version.is_none() {
            self.session.version = Some(HttpVersion::V0_9);
            match self.session.direction {
                crate::paf::session::Direction::Request => self.session.flags.request_seen = true,
                crate::paf::session::Direction::Response => self.session.flags.response_seen = true,
            }
        }

        // A 100-Continue is an interim response: the real final status line
        // for this request still follows, so this isn't the no-body flush
        // point the other 1xx codes are, and it doesn't consume a pipeline
        // slot. Reset and keep scanning for that real status line.
        if self.session.direction == crate::paf::session::Direction::Response && self.session.status_code == 100 {
            self.session.reset_for_next_message(State::P0);
            return Outcome::Continue;
        }

        let flags = self.session.flags;

        if self.session.direction == crate::paf::session::Direction::Request {
            self.session.push_pipeline(matches!(self.last_method.as_slice(), b"HEAD"));
        } else {
            let is_head = self.session.pop_pipeline();
            if is_head {
                self.session.flags.no_body = true;
            }
        }

        if flags.post_seen && !flags.length_known && !flags.chunked {
            self.session.flags.error_deferred = true;
            let flush_at = self.session.bytes_scanned;
            self.session.reset_for_next_message(self.start_state());
            return Outcome::FlushAt(flush_at);
        }

        if self.session.flags.no_body {
            self.session.length = 0;
            self.session.flags.length_known = false;
            let flush_at = self.session.bytes_scanned;
            self.session.reset_for_next_message(self.start_state());
            return Outcome::FlushAt(flush_at);
        }

        if self.session.flags.chunked {
            self.session.length = 0;
            self.session.flags.no_flush = true;
            self.session.node = State::R6ChunkLenHex;
            return Outcome::Continue;
        }

        if self.session.flags.request_seen || self.session.flags.length_known {
            let flush_at = self.session.bytes_scanned + self.session.length;
            self.session.reset_for_next_message(self.start_state());
            return Outcome::FlushAt(flush_at);
        }

        if self.session.direction == crate::paf::session::Direction::Response
            && self.session.version == Some(HttpVersion::V1_1)
        {
            self.session.flags.error_deferred = true;
            let flush_at = self.session.bytes_scanned;
            self.session.reset_for_next_message(self.start_state());
            return Outcome::FlushAt(flush_at);
        }

        Outcome::Abort
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paf::session::Direction;

    fn scan(fsm: &mut Fsm, data: &[u8]) -> Vec<Outcome> {
        data.iter().map(|b| fsm.feed(*b)).collect()
    }

    #[test]
    fn simple_request_flushes_at_end_of_request_line() {
        let mut fsm = Fsm::new(Direction::Request, None);
        let outcomes = scan(&mut fsm, b"GET /\r\n");
        assert!(matches!(outcomes.last(), Some(Outcome::FlushAt(_))));
    }

    #[test]
    fn post_without_length_defers_error_and_flushes() {
        let mut fsm = Fsm::new(Direction::Request, None);
        let outcomes = scan(&mut fsm, b"POST / HTTP/1.1\r\n\r\n");
        assert!(matches!(outcomes.last(), Some(Outcome::FlushAt(_))));
        assert!(fsm.session.flags.error_deferred);
    }

    #[test]
    fn post_with_content_length_flushes_after_body() {
        let mut fsm = Fsm::new(Direction::Request, None);
        let outcomes = scan(&mut fsm, b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\n");
        let flush = outcomes.last().copied().unwrap();
        match flush {
            Outcome::FlushAt(n) => assert_eq!(n, fsm.session.bytes_scanned + 4),
            other => panic!("expected FlushAt, got {other:?}"),
        }
    }

    #[test]
    fn chunked_transfer_encoding_is_recognized() {
        let mut fsm = Fsm::new(Direction::Request, None);
        let _ = scan(&mut fsm, b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert!(fsm.session.flags.chunked);
    }

    #[test]
    fn pipelined_requests_each_push_the_pipeline() {
        let mut fsm = Fsm::new(Direction::Request, None);
        let _ = scan(&mut fsm, b"GET /a HTTP/1.1\r\n\r\n");
        assert_eq!(fsm.session.nreq, 1);
    }

    /// A `HEAD` request must be recorded as such on the pipeline bitmap so
    /// the paired response's `end_of_headers` can mark it no-body — the
    /// method classification that feeds this happens long before the
    /// request's own `end_of_headers` runs (`classify_method` fires on
    /// `Q0` exit, right after the method token), so the FSM must retain it
    /// across that gap rather than losing it to `method_scratch` getting
    /// cleared immediately after classification.
    #[test]
    fn head_request_pushes_a_head_flagged_pipeline_slot() {
        let mut fsm = Fsm::new(Direction::Request, None);
        let outcomes = scan(&mut fsm, b"HEAD / HTTP/1.1\r\n\r\n");
        assert!(matches!(outcomes.last(), Some(Outcome::FlushAt(_))));
        assert_eq!(fsm.session.nreq, 1);
        assert_eq!(fsm.session.pipe & 1, 1, "HEAD bit must be set on the pipeline bitmap");
    }

    /// Seed boundary case (spec §8): `HEAD / HTTP/1.1\r\n\r\n` followed by
    /// `HTTP/1.1 200 OK\r\nContent-Length: 99\r\n\r\n` — the response must
    /// flush at 39 bytes (its own length) without waiting for the 99-byte
    /// body a HEAD response never sends. The pipeline bitmap is per
    /// direction; a real caller bridges it across the request/response
    /// session pair per flow, which this test does by hand.
    #[test]
    fn head_response_flushes_without_consuming_its_content_length_body() {
        let request = b"HEAD / HTTP/1.1\r\n\r\n";
        let mut request_fsm = Fsm::new(Direction::Request, None);
        let _ = scan(&mut request_fsm, request);
        let head_bit = request_fsm.session.pop_pipeline();
        assert!(head_bit, "request must be recorded as HEAD");

        let response = b"HTTP/1.1 200 OK\r\nContent-Length: 99\r\n\r\n";
        let mut response_fsm = Fsm::new(Direction::Response, None);
        response_fsm.session.push_pipeline(head_bit);
        let outcomes = scan(&mut response_fsm, response);
        match outcomes.last().copied().unwrap() {
            Outcome::FlushAt(n) => assert_eq!(n, response.len() as u64),
            other => panic!("expected FlushAt at the response's own length, got {other:?}"),
        }
    }

    /// `Fsm::with_max_pipeline` must actually reach the session's rupture
    /// threshold rather than the FSM silently falling back to the
    /// hardcoded `MAX_PIPELINE` default regardless of configuration.
    #[test]
    fn with_max_pipeline_reaches_the_session_rupture_threshold() {
        let mut fsm = Fsm::with_max_pipeline(Direction::Request, None, 1);
        let _ = scan(&mut fsm, b"GET /a HTTP/1.1\r\n\r\n");
        assert_eq!(fsm.session.nreq, 1);
        assert_ne!(fsm.session.pipe, crate::paf::session::PIPELINE_RUPTURED);

        let _ = scan(&mut fsm, b"GET /b HTTP/1.1\r\n\r\n");
        assert_eq!(fsm.session.pipe, crate::paf::session::PIPELINE_RUPTURED, "depth 1 must rupture on the second request");
    }

    /// After a body-bearing request flushes, the FSM must rewind to `Q0`
    /// so the next pipelined request's own method/URI/version is parsed
    /// fresh rather than being fed into whatever header-scan state the
    /// prior message left behind.
    #[test]
    fn second_pipelined_request_parses_correctly_after_a_body_bearing_first() {
        let first = b"POST /a HTTP/1.1\r\nContent-Length: 4\r\n\r\n";
        let second = b"GET /b HTTP/1.1\r\n\r\n";

        let mut fsm = Fsm::new(Direction::Request, None);
        let first_outcomes = scan(&mut fsm, first);
        let first_flush = match first_outcomes.last().copied().unwrap() {
            Outcome::FlushAt(n) => n,
            other => panic!("expected FlushAt, got {other:?}"),
        };
        assert_eq!(first_flush, first.len() as u64 + 4);
        assert_eq!(fsm.session.node, State::Q0, "must rewind for the next message");

        let second_outcomes = scan(&mut fsm, second);
        assert!(!second_outcomes.iter().any(|o| matches!(o, Outcome::Abort)), "{second_outcomes:?}");
        match second_outcomes.last().copied().unwrap() {
            // `bytes_scanned` runs cumulatively across the whole direction.
            // The body bytes of `first` are never fed here (a real caller
            // skips straight to the flush offset instead of re-scanning
            // the body), so the count only advances by each message's own
            // header bytes.
            Outcome::FlushAt(n) => assert_eq!(n, first.len() as u64 + second.len() as u64),
            other => panic!("expected FlushAt for the second request, got {other:?}"),
        }
    }

    #[test]
    fn byte_budget_cap_aborts() {
        let mut fsm = Fsm::new(Direction::Request, Some(4));
        let outcomes = scan(&mut fsm, b"GET /\r\n");
        assert!(outcomes.iter().any(|o| matches!(o, Outcome::Abort)));
    }

    #[test]
    fn feed_slice_takes_memchr_fast_path_through_unknown_header() {
        let mut byte_by_byte = Fsm::new(Direction::Request, None);
        let request = b"GET / HTTP/1.1\r\nX-Custom: some long unrecognized header value\r\n\r\n";
        let last_byte_by_byte = scan(&mut byte_by_byte, request).last().copied().unwrap();

        let mut bulk = Fsm::new(Direction::Request, None);
        let last_bulk = bulk.feed_slice(request);

        assert_eq!(last_bulk, last_byte_by_byte);
        assert_eq!(bulk.session.bytes_scanned, byte_by_byte.session.bytes_scanned);
    }

    #[test]
    fn continue_status_skips_the_no_body_flush_and_scans_into_the_real_response() {
        let mut fsm = Fsm::new(Direction::Response, None);
        let outcomes = scan(&mut fsm, b"HTTP/1.1 100 Continue\r\n\r\n");
        assert!(outcomes.iter().all(|o| matches!(o, Outcome::Continue)), "{outcomes:?}");
        assert_eq!(fsm.session.node, State::P0);
        assert_eq!(fsm.session.status_code, 0);

        let final_outcomes = scan(&mut fsm, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n");
        assert!(matches!(final_outcomes.last(), Some(Outcome::FlushAt(_))));
    }

    #[test]
    fn non_http_prefix_aborts_immediately() {
        let mut fsm = Fsm::new(Direction::Request, None);
        let outcomes = scan(&mut fsm, b"\x16\x03\x01");
        assert!(matches!(outcomes[0], Outcome::Abort));
        assert!(fsm.session.aborted);
    }

    #[test]
    fn feed_slice_without_trailing_lf_continues_and_counts_bytes() {
        let mut fsm = Fsm::new(Direction::Request, None);
        let _ = fsm.feed_slice(b"GET / HTTP/1.1\r\nX-Custom: ");
        assert_eq!(fsm.session.node, crate::paf::table::State::R8SkipToEol);
        let outcome = fsm.feed_slice(b"unterminated value without a newline yet");
        assert_eq!(outcome, Outcome::Continue);
    }
}
