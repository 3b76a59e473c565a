//! Seed scenario 4: two pipelined GET requests on one stream flush at
//! exactly the end of each request's blank line, not at arbitrary TCP
//! segment boundaries.

use dpi_core::paf::{Direction, Fsm, Outcome};

#[test]
fn pipelined_gets_flush_at_19_and_38() {
    let stream = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
    let mut fsm = Fsm::new(Direction::Request, None);

    let mut flushes = Vec::new();
    let mut offset = 0;
    while offset < stream.len() {
        match fsm.feed(stream[offset]) {
            Outcome::FlushAt(n) => flushes.push(n),
            Outcome::Abort => panic!("unexpected abort at byte {offset}"),
            _ => {}
        }
        offset += 1;
    }

    assert_eq!(flushes, vec![19, 38]);
}
