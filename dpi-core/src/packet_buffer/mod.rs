//! Packet-Buffer (§4.1): a doubly-linked FIFO of queued packet envelopes,
//! lock-protected, supporting enqueue, dequeue, peek, and tuple-keyed
//! removal in O(1) for the first three and O(n) for tuple removal.
//!
//! Per the design note in §9, this is a bounded slab of indexed entries
//! (arena + free list) with 32-bit handles rather than raw linked-list
//! pointers — same O(1) enqueue/dequeue, better cache locality, and no
//! pointer-validity hazard to reason about (the source's
//! `packet_buffer_dequeue` dereferences `q->head->prev` without checking
//! that the new head is non-null; the slab form makes that check a plain
//! `if let Some(h) = new_head`, not a null-pointer risk — see DESIGN.md).

use std::sync::Mutex;

use crate::wire::{FiveTuple, PacketEnvelope};

type Handle = u32;

struct Slot {
    packet: PacketEnvelope,
    prev: Option<Handle>,
    next: Option<Handle>,
}

struct Inner {
    slots: Vec<Option<Slot>>,
    free: Vec<Handle>,
    head: Option<Handle>,
    tail: Option<Handle>,
    len: usize,
}

impl Inner {
    fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), head: None, tail: None, len: 0 }
    }

    fn alloc(&mut self, slot: Slot) -> Handle {
        if let Some(h) = self.free.pop() {
            self.slots[h as usize] = Some(slot);
            h
        } else {
            self.slots.push(Some(slot));
            (self.slots.len() - 1) as Handle
        }
    }

    fn take(&mut self, h: Handle) -> Slot {
        let slot = self.slots[h as usize].take().expect("handle must be live");
        self.free.push(h);
        slot
    }
}

/// A lock-protected FIFO of packet envelopes. All five operations are
/// linearizable on the queue; enqueue/dequeue/peek run in O(1).
pub struct PacketBuffer {
    inner: Mutex<Inner>,
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::new()) }
    }

    /// Releases every remaining entry (and the packet each owns, since
    /// ownership is exclusive — there is nothing to optionally keep).
    pub fn destroy(&self) {
        let mut inner = self.inner.lock().expect("packet buffer lock poisoned");
        inner.slots.clear();
        inner.free.clear();
        inner.head = None;
        inner.tail = None;
        inner.len = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("packet buffer lock poisoned").len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// O(1) append at tail.
    pub fn enqueue(&self, packet: PacketEnvelope) {
        let mut inner = self.inner.lock().expect("packet buffer lock poisoned");
        let old_tail = inner.tail;
        let handle = inner.alloc(Slot { packet, prev: old_tail, next: None });
        if let Some(t) = old_tail {
            inner.slots[t as usize].as_mut().unwrap().next = Some(handle);
        }
        inner.tail = Some(handle);
        if inner.head.is_none() {
            inner.head = Some(handle);
        }
        inner.len += 1;
    }

    /// O(1) remove from head; `None` when empty.
    pub fn dequeue(&self) -> Option<PacketEnvelope> {
        let mut inner = self.inner.lock().expect("packet buffer lock poisoned");
        let head = inner.head?;
        let slot = inner.take(head);
        inner.head = slot.next;
        if let Some(new_head) = inner.head {
            inner.slots[new_head as usize].as_mut().unwrap().prev = None;
        } else {
            inner.tail = None;
        }
        inner.len -= 1;
        Some(slot.packet)
    }

    /// Non-destructive read of head's arrival time, for the janitor sweep
    /// (§4.2 step 4), without cloning the packet.
    pub fn peek_arrival(&self) -> Option<std::time::Instant> {
        let inner = self.inner.lock().expect("packet buffer lock poisoned");
        let head = inner.head?;
        Some(inner.slots[head as usize].as_ref().unwrap().packet.captured_at)
    }

    /// O(n) linear scan for a packet whose parsed fields match exactly;
    /// removes and returns it if found.
    pub fn pop_by_tuple(&self, tuple: &FiveTuple, seqnum: u32) -> Option<PacketEnvelope> {
        self.pop_by(|p| p.seq_key == seqnum && p.five_tuple == *tuple)
    }

    /// O(n) linear scan matching on the sequence key alone, ignoring the
    /// 5-tuple. The reconciler uses this form (§4.2 dispatch): a sideband
    /// report's own UDP 5-tuple is the inter-middlebox control channel's,
    /// not the monitored flow's, and the wire format (§6) carries no tuple
    /// for the flow being described — only `flow_seq_key`. Seed test 2
    /// pairs a data packet and a sideband report that carry entirely
    /// different 5-tuples, which a tuple-constrained pop could never find.
    pub fn pop_by_seq(&self, seqnum: u32) -> Option<PacketEnvelope> {
        self.pop_by(|p| p.seq_key == seqnum)
    }

    fn pop_by(&self, matches: impl Fn(&PacketEnvelope) -> bool) -> Option<PacketEnvelope> {
        let mut inner = self.inner.lock().expect("packet buffer lock poisoned");
        let mut cursor = inner.head;
        while let Some(h) = cursor {
            let slot_ref = inner.slots[h as usize].as_ref().unwrap();
            let is_match = matches(&slot_ref.packet);
            let next = slot_ref.next;
            if is_match {
                let slot = inner.take(h);
                match slot.prev {
                    Some(p) => inner.slots[p as usize].as_mut().unwrap().next = slot.next,
                    None => inner.head = slot.next,
                }
                match slot.next {
                    Some(n) => inner.slots[n as usize].as_mut().unwrap().prev = slot.prev,
                    None => inner.tail = slot.prev,
                }
                inner.len -= 1;
                return Some(slot.packet);
            }
            cursor = next;
        }
        None
    }

    /// Drops every entry whose arrival time is older than `now - timeout`,
    /// walking from the head (oldest first). Returns the count dropped.
    pub fn evict_older_than(&self, now: std::time::Instant, timeout: std::time::Duration) -> usize {
        let mut dropped = 0;
        while let Some(arrival) = self.peek_arrival() {
            if now.saturating_duration_since(arrival) < timeout {
                break;
            }
            if self.dequeue().is_none() {
                break;
            }
            dropped += 1;
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Proto;
    use std::time::Instant;

    fn tuple(port: u16) -> FiveTuple {
        FiveTuple {
            src_ip: "10.0.0.1".parse().unwrap(),
            dst_ip: "10.0.0.2".parse().unwrap(),
            src_port: port,
            dst_port: 80,
            proto: Proto::Tcp,
        }
    }

    fn envelope(port: u16, seq: u32) -> PacketEnvelope {
        PacketEnvelope::synthetic(tuple(port), seq, Instant::now())
    }

    #[test]
    fn empty_buffer_invariants() {
        let q = PacketBuffer::new();
        assert_eq!(q.len(), 0);
        assert!(q.is_empty());
        assert!(q.dequeue().is_none());
        assert!(q.peek_arrival().is_none());
    }

    #[test]
    fn enqueue_dequeue_is_fifo() {
        let q = PacketBuffer::new();
        q.enqueue(envelope(1, 1));
        q.enqueue(envelope(2, 2));
        assert_eq!(q.len(), 2);
        let first = q.dequeue().unwrap();
        assert_eq!(first.five_tuple.src_port, 1);
        let second = q.dequeue().unwrap();
        assert_eq!(second.five_tuple.src_port, 2);
        assert!(q.is_empty());
    }

    #[test]
    fn pop_by_tuple_removes_at_most_one_match() {
        let q = PacketBuffer::new();
        q.enqueue(envelope(1, 10));
        q.enqueue(envelope(2, 20));
        q.enqueue(envelope(3, 30));
        let found = q.pop_by_tuple(&tuple(2), 20).unwrap();
        assert_eq!(found.five_tuple.src_port, 2);
        assert_eq!(q.len(), 2);
        assert!(q.pop_by_tuple(&tuple(2), 20).is_none());
        // remaining two still dequeue in original relative order
        assert_eq!(q.dequeue().unwrap().five_tuple.src_port, 1);
        assert_eq!(q.dequeue().unwrap().five_tuple.src_port, 3);
    }

    #[test]
    fn pop_by_seq_ignores_tuple() {
        let q = PacketBuffer::new();
        q.enqueue(envelope(1, 10));
        let other_tuple = FiveTuple {
            src_ip: "10.0.0.3".parse().unwrap(),
            dst_ip: "10.0.0.4".parse().unwrap(),
            src_port: 9999,
            dst_port: 9999,
            proto: Proto::Udp,
        };
        q.enqueue(PacketEnvelope::synthetic(other_tuple, 20, Instant::now()));
        let found = q.pop_by_seq(20).unwrap();
        assert_eq!(found.seq_key, 20);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn pop_by_tuple_on_single_element_queue_empties_it() {
        let q = PacketBuffer::new();
        q.enqueue(envelope(1, 1));
        assert!(q.pop_by_tuple(&tuple(1), 1).is_some());
        assert_eq!(q.len(), 0);
        assert!(q.is_empty());
    }
}
