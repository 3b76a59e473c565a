//! FSM vocabulary and state transitions (§4.3 FSM layout). Five blocks of
//! contiguous states — response prefix, request prefix, header scan,
//! transfer-encoding scan, skip-to-EOL — each one block of a single
//! transition function. Multi-byte literals ("HTTP/1.", "Content-Length:",
//! "Transfer-Encoding:") are expanded into one synthetic state per
//! remaining character, carried as the state variant's index field, rather
//! than as a separately generated table: `rustc` compiles the match below
//! into the same dense per-state jump table the source builds by hand.

use crate::paf::classes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    P0,
    PLit(u8),
    P1VersionDigit,
    P2Code(u8),
    P3Reason,

    Q0,
    Q1Uri,
    Q2VersionLit(u8),
    Q2VersionDigit,
    Q3RequestLine,

    R2HeaderStart,
    R2ContentLengthLit(u8),
    R2ContentLengthColon,
    R2ContentLengthValue,
    R3TransferEncodingLit(u8),
    R3TransferEncodingColon,
    R3TransferEncodingValue(u8),
    R8SkipToEol,

    R6ChunkLenHex,

    Done,
}

/// Closed action set (§4.3 Actions). Each action updates PAF session
/// fields; it never itself selects the next state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Nop,
    NoBodyOnResponse,
    GetMethod,
    PostMethod,
    SawV09,
    SawV10,
    SawV11,
    SawRequestLine,
    SawRequestDone,
    SawResponseDone,
    ShiftIntoDecimal,
    ShiftIntoHex,
    LengthKnown,
    ChunkLengthKnown,
    ClearLength,
    Chunked,
    ClearChunkState,
    HeaderKeyword,
}

#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub action: Action,
    pub next: State,
}

const fn entry(action: Action, next: State) -> Entry {
    Entry { action, next }
}

const HTTP_LIT: &[u8] = b"HTTP/1.";
const CONTENT_LENGTH_LIT: &[u8] = b"content-length:";
const TRANSFER_ENCODING_LIT: &[u8] = b"transfer-encoding:";
const CHUNKED_LIT: &[u8] = b"chunked";

fn matches_ci(byte: u8, literal_byte: u8) -> bool {
    byte.to_ascii_lowercase() == literal_byte.to_ascii_lowercase()
}

/// Dense per-state transition: given the current node and the next byte
/// (already past the line wrapper — no CR ever reaches here), returns the
/// action to run and the next node. `abort` cases (prefix doesn't look
/// like HTTP at all) are signaled by returning `State::Done` with
/// `Action::Nop` from `P0`/`Q0`; the driver in `fsm.rs` treats that as a
/// hand-off to generic inspection rather than a table cell.
pub fn transition(state: State, byte: u8) -> Entry {
    let c = classes::table();
    match state {
        State::P0 => {
            if matches_ci(byte, HTTP_LIT[0]) {
                entry(Action::Nop, State::PLit(1))
            } else {
                entry(Action::Nop, State::Done)
            }
        }
        State::PLit(i) => {
            let i = i as usize;
            if i < HTTP_LIT.len() && matches_ci(byte, HTTP_LIT[i]) {
                if i + 1 == HTTP_LIT.len() {
                    entry(Action::Nop, State::P1VersionDigit)
                } else {
                    entry(Action::Nop, State::PLit((i + 1) as u8))
                }
            } else {
                entry(Action::Nop, State::Done)
            }
        }
        State::P1VersionDigit => match byte {
            b'1' => entry(Action::SawV11, State::P2Code(0)),
            b'0' => entry(Action::SawV10, State::P2Code(0)),
            _ => entry(Action::Nop, State::Done),
        },
        State::P2Code(n) => {
            if c.is(byte, classes::DIGIT) && n < 3 {
                let next = if n == 2 { State::P3Reason } else { State::P2Code(n + 1) };
                entry(Action::ShiftIntoDecimal, next)
            } else if c.is(byte, classes::EOL) {
                entry(Action::SawResponseDone, State::Done)
            } else {
                entry(Action::Nop, State::P3Reason)
            }
        }
        State::P3Reason => {
            if c.is(byte, classes::EOL) {
                entry(Action::SawResponseDone, State::Done)
            } else {
                entry(Action::Nop, State::P3Reason)
            }
        }

        State::Q0 => {
            if c.is(byte, classes::LWS) {
                entry(Action::Nop, State::Q1Uri)
            } else if c.is(byte, classes::TOKEN) {
                entry(Action::Nop, State::Q0)
            } else {
                entry(Action::Nop, State::Done)
            }
        }
        State::Q1Uri => {
            if c.is(byte, classes::LWS) {
                entry(Action::Nop, State::Q2VersionLit(0))
            } else if c.is(byte, classes::EOL) {
                // Simple-request (no version token): the wrapper already
                // emits `EndOfHeaders` directly for this case without
                // calling into the table; reaching here only via a
                // malformed stream that the request-line sink absorbs.
                entry(Action::Nop, State::Q3RequestLine)
            } else {
                entry(Action::Nop, State::Q1Uri)
            }
        }
        State::Q2VersionLit(i) => {
            let idx = i as usize;
            if idx < HTTP_LIT.len() && matches_ci(byte, HTTP_LIT[idx]) {
                if idx + 1 == HTTP_LIT.len() {
                    entry(Action::Nop, State::Q2VersionDigit)
                } else {
                    entry(Action::Nop, State::Q2VersionLit((idx + 1) as u8))
                }
            } else if c.is(byte, classes::EOL) {
                entry(Action::Nop, State::Q3RequestLine)
            } else {
                // Not a version token after all; treat rest of line as URI tail.
                entry(Action::Nop, State::Q3RequestLine)
            }
        }
        State::Q2VersionDigit => match byte {
            b'1' => entry(Action::SawV11, State::Q3RequestLine),
            b'0' => entry(Action::SawV10, State::Q3RequestLine),
            _ => entry(Action::Nop, State::Q3RequestLine),
        },
        State::Q3RequestLine => {
            if c.is(byte, classes::EOL) {
                entry(Action::SawRequestLine, State::Done)
            } else {
                entry(Action::Nop, State::Q3RequestLine)
            }
        }

        State::R2HeaderStart => {
            if matches_ci(byte, CONTENT_LENGTH_LIT[0]) {
                entry(Action::Nop, State::R2ContentLengthLit(1))
            } else if matches_ci(byte, TRANSFER_ENCODING_LIT[0]) {
                entry(Action::Nop, State::R3TransferEncodingLit(1))
            } else if c.is(byte, classes::EOL) {
                entry(Action::Nop, State::R2HeaderStart)
            } else {
                entry(Action::Nop, State::R8SkipToEol)
            }
        }
        State::R2ContentLengthLit(i) => {
            let idx = i as usize;
            if idx < CONTENT_LENGTH_LIT.len() && matches_ci(byte, CONTENT_LENGTH_LIT[idx]) {
                if idx + 1 == CONTENT_LENGTH_LIT.len() {
                    entry(Action::HeaderKeyword, State::R2ContentLengthColon)
                } else {
                    entry(Action::Nop, State::R2ContentLengthLit((idx + 1) as u8))
                }
            } else {
                entry(Action::Nop, State::R8SkipToEol)
            }
        }
        State::R2ContentLengthColon => {
            if c.is(byte, classes::LWS) {
                entry(Action::Nop, State::R2ContentLengthColon)
            } else if c.is(byte, classes::DIGIT) {
                entry(Action::ShiftIntoDecimal, State::R2ContentLengthValue)
            } else {
                entry(Action::Nop, State::R8SkipToEol)
            }
        }
        State::R2ContentLengthValue => {
            if c.is(byte, classes::DIGIT) {
                entry(Action::ShiftIntoDecimal, State::R2ContentLengthValue)
            } else if c.is(byte, classes::EOL) {
                entry(Action::LengthKnown, State::R2HeaderStart)
            } else {
                entry(Action::LengthKnown, State::R8SkipToEol)
            }
        }

        State::R3TransferEncodingLit(i) => {
            let idx = i as usize;
            if idx < TRANSFER_ENCODING_LIT.len() && matches_ci(byte, TRANSFER_ENCODING_LIT[idx]) {
                if idx + 1 == TRANSFER_ENCODING_LIT.len() {
                    entry(Action::HeaderKeyword, State::R3TransferEncodingColon)
                } else {
                    entry(Action::Nop, State::R3TransferEncodingLit((idx + 1) as u8))
                }
            } else {
                entry(Action::Nop, State::R8SkipToEol)
            }
        }
        State::R3TransferEncodingColon => {
            if c.is(byte, classes::LWS) {
                entry(Action::Nop, State::R3TransferEncodingColon)
            } else if matches_ci(byte, CHUNKED_LIT[0]) {
                entry(Action::Nop, State::R3TransferEncodingValue(1))
            } else {
                entry(Action::Nop, State::R8SkipToEol)
            }
        }
        State::R3TransferEncodingValue(i) => {
            let idx = i as usize;
            if idx < CHUNKED_LIT.len() && matches_ci(byte, CHUNKED_LIT[idx]) {
                if idx + 1 == CHUNKED_LIT.len() {
                    entry(Action::Chunked, State::R8SkipToEol)
                } else {
                    entry(Action::Nop, State::R3TransferEncodingValue((idx + 1) as u8))
                }
            } else {
                entry(Action::Nop, State::R8SkipToEol)
            }
        }

        State::R8SkipToEol => {
            if c.is(byte, classes::EOL) {
                entry(Action::Nop, State::R2HeaderStart)
            } else {
                entry(Action::Nop, State::R8SkipToEol)
            }
        }

        State::R6ChunkLenHex => {
            if byte.is_ascii_hexdigit() {
                entry(Action::ShiftIntoHex, State::R6ChunkLenHex)
            } else if c.is(byte, classes::EOL) {
                entry(Action::ChunkLengthKnown, State::Done)
            } else {
                entry(Action::Nop, State::R6ChunkLenHex)
            }
        }

        State::Done => entry(Action::Nop, State::Done),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p0_rejects_non_http_prefix() {
        let e = transition(State::P0, b'X');
        assert_eq!(e.next, State::Done);
    }

    #[test]
    fn content_length_literal_is_case_insensitive() {
        let mut state = State::R2HeaderStart;
        for b in b"CoNtEnT-LeNgTh:" {
            let e = transition(state, *b);
            state = e.next;
        }
        assert_eq!(state, State::R2ContentLengthColon);
    }
}
