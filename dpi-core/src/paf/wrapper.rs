//! Line-mode wrapper (§4.3 Line wrapper): sits above the FSM and turns a
//! raw byte stream into a token stream augmented with synthetic `Eol` and
//! `Lws` events. CR never reaches the FSM.
//!
//! Blank-line (end-of-headers) detection is driven by whether the current
//! line has carried any byte since its start, not by peeking at the byte
//! after an `LF` — that keeps every content-bearing line's own `Eol`
//! available to the FSM the instant its terminating `LF` arrives, which
//! matters for any state (request-line, header value, chunk-size line)
//! whose action fires only on the EOL class itself.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Byte(u8),
    /// Folded header continuation (SPACE/TAB right after a line's LF).
    Lws,
    /// A single, content-bearing line just ended.
    Eol,
    /// A blank line ended: end of headers (or a legal simple-request's
    /// only line).
    EndOfHeaders,
}

pub struct LineWrapper {
    at_line_start: bool,
    line_has_content: bool,
    saw_first_eol: bool,
}

impl LineWrapper {
    pub fn new() -> Self {
        Self { at_line_start: true, line_has_content: false, saw_first_eol: false }
    }

    /// Feeds one raw byte. `simple_request_legal` tells the wrapper
    /// whether the FSM is still in a state where a bodyless simple-request
    /// is possible — only consulted for the very first line ending.
    pub fn feed(&mut self, byte: u8, simple_request_legal: bool) -> Option<Token> {
        if byte == b'\r' {
            return None;
        }

        if byte == b'\n' {
            let is_first = !self.saw_first_eol;
            self.saw_first_eol = true;
            let blank = !self.line_has_content;
            self.line_has_content = false;
            self.at_line_start = true;

            return if is_first && simple_request_legal {
                Some(Token::EndOfHeaders)
            } else if blank {
                Some(Token::EndOfHeaders)
            } else {
                Some(Token::Eol)
            };
        }

        if self.at_line_start && (byte == b' ' || byte == b'\t') {
            self.at_line_start = false;
            return Some(Token::Lws);
        }

        self.at_line_start = false;
        self.line_has_content = true;
        Some(Token::Byte(byte))
    }

    /// Fast-path counterpart to `feed`'s LF handling, for callers that
    /// locate the next LF themselves (memchr over a skip-to-EOL run)
    /// instead of feeding every byte through the wrapper. The skipped run
    /// is assumed to be mid-line content, so there's no blank-line check
    /// to make and no token to produce.
    pub fn mark_line_ended(&mut self) {
        self.line_has_content = false;
        self.at_line_start = true;
        self.saw_first_eol = true;
    }
}

impl Default for LineWrapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cr_is_swallowed() {
        let mut w = LineWrapper::new();
        assert_eq!(w.feed(b'\r', false), None);
    }

    #[test]
    fn content_line_yields_eol_not_end_of_headers() {
        let mut w = LineWrapper::new();
        w.feed(b'x', false);
        assert_eq!(w.feed(b'\n', false), Some(Token::Eol));
    }

    #[test]
    fn two_lfs_with_no_content_between_is_end_of_headers() {
        let mut w = LineWrapper::new();
        w.feed(b'x', false);
        w.feed(b'\n', false);
        assert_eq!(w.feed(b'\n', false), Some(Token::EndOfHeaders));
    }

    #[test]
    fn first_lf_with_simple_request_legal_is_immediate_end_of_headers() {
        let mut w = LineWrapper::new();
        w.feed(b'G', true);
        assert_eq!(w.feed(b'\n', true), Some(Token::EndOfHeaders));
    }

    #[test]
    fn space_at_line_start_is_fold() {
        let mut w = LineWrapper::new();
        w.feed(b'x', false);
        w.feed(b'\n', false);
        assert_eq!(w.feed(b' ', false), Some(Token::Lws));
    }
}
