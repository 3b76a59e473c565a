//! Captured-frame parsing: Ethernet -> IPv4 -> TCP/UDP/ICMP, into the
//! immutable parsed projection the reconciler and orchestrator operate on.
//!
//! Parsed eagerly at ingest and never re-derived; every offset below is
//! taken directly from the RFC 791 / RFC 793 / RFC 768 header layouts
//! rather than through a generic parsing crate, because the reconciler's
//! correctness hinges on exact access to fields most header crates treat
//! as internal (the raw TOS byte, the raw TCP sequence number, the raw UDP
//! checksum word used here as an opaque sequence key).

use std::net::Ipv4Addr;
use std::ops::Range;
use std::time::Instant;

use bytes::BytesMut;

const ETHERNET_HEADER_LEN: usize = 14;
const ETHERTYPE_IPV4: u16 = 0x0800;

/// Bits 7 and 6 of the IPv4 TOS byte; both set means "packet has matches".
pub const TOS_HAS_MATCHES_MASK: u8 = 0xC0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proto {
    Tcp,
    Udp,
    Icmp,
    Other(u8),
}

impl Proto {
    fn from_ip_protocol(n: u8) -> Self {
        match n {
            6 => Proto::Tcp,
            17 => Proto::Udp,
            1 => Proto::Icmp,
            other => Proto::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub proto: Proto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    TooShortForEthernet,
    NotIpv4,
    TooShortForIpv4,
    BadIhl,
    TooShortForTransport,
}

/// A captured frame parsed into the fields the reconciler and orchestrator
/// need, with ownership of the raw bytes so the reconciler can rewrite the
/// TOS byte in place before forwarding (§4.2.a, terminal-hop scrubbing).
#[derive(Debug, Clone)]
pub struct PacketEnvelope {
    pub raw: BytesMut,
    pub captured_at: Instant,
    pub seq_key: u32,
    pub five_tuple: FiveTuple,
    pub total_len: u16,
    pub tos: u8,
    pub ttl: u8,
    payload_range: Range<usize>,
}

impl PacketEnvelope {
    /// Parse an Ethernet frame carrying an IPv4 datagram. Anything else
    /// (ARP, IPv6, malformed frames) is a recoverable per-packet error the
    /// caller should drop and count (§7).
    pub fn parse(raw: BytesMut, captured_at: Instant) -> Result<Self, ParseError> {
        if raw.len() < ETHERNET_HEADER_LEN + 20 {
            return Err(ParseError::TooShortForEthernet);
        }
        let ethertype = u16::from_be_bytes([raw[12], raw[13]]);
        if ethertype != ETHERTYPE_IPV4 {
            return Err(ParseError::NotIpv4);
        }

        let ip_start = ETHERNET_HEADER_LEN;
        if raw.len() < ip_start + 20 {
            return Err(ParseError::TooShortForIpv4);
        }
        let ip = &raw[ip_start..];
        let version = ip[0] >> 4;
        let ihl = (ip[0] & 0x0F) as usize * 4;
        if version != 4 || ihl < 20 || raw.len() < ip_start + ihl {
            return Err(ParseError::BadIhl);
        }
        let tos = ip[1];
        let total_len = u16::from_be_bytes([ip[2], ip[3]]);
        let ttl = ip[8];
        let protocol = ip[9];
        let src_ip = Ipv4Addr::new(ip[12], ip[13], ip[14], ip[15]);
        let dst_ip = Ipv4Addr::new(ip[16], ip[17], ip[18], ip[19]);

        let transport_start = ip_start + ihl;
        let proto = Proto::from_ip_protocol(protocol);
        let (src_port, dst_port, seq_key, payload_start) = match proto {
            Proto::Tcp => {
                if raw.len() < transport_start + 20 {
                    return Err(ParseError::TooShortForTransport);
                }
                let t = &raw[transport_start..];
                let src = u16::from_be_bytes([t[0], t[1]]);
                let dst = u16::from_be_bytes([t[2], t[3]]);
                let seq = u32::from_be_bytes([t[4], t[5], t[6], t[7]]);
                let data_offset = (t[12] >> 4) as usize * 4;
                (src, dst, seq, transport_start + data_offset.max(20))
            }
            Proto::Udp => {
                if raw.len() < transport_start + 8 {
                    return Err(ParseError::TooShortForTransport);
                }
                let t = &raw[transport_start..];
                let src = u16::from_be_bytes([t[0], t[1]]);
                let dst = u16::from_be_bytes([t[2], t[3]]);
                // Spec §4.2: the UDP checksum word doubles as the opaque
                // sequence key for UDP packets. Unusual, preserved as-is.
                let checksum = u16::from_be_bytes([t[6], t[7]]);
                (src, dst, checksum as u32, transport_start + 8)
            }
            Proto::Icmp | Proto::Other(_) => (0, 0, 0, transport_start),
        };

        let payload_range = payload_start.min(raw.len())..raw.len();

        Ok(Self {
            raw,
            captured_at,
            seq_key,
            five_tuple: FiveTuple { src_ip, dst_ip, src_port, dst_port, proto },
            total_len,
            tos,
            ttl,
            payload_range,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.raw[self.payload_range.clone()]
    }

    pub fn payload_offset(&self) -> usize {
        self.payload_range.start
    }

    /// Bits 7 and 6 of TOS both set ⇒ "packet has matches" (§6).
    pub fn has_matches(&self) -> bool {
        self.tos & TOS_HAS_MATCHES_MASK == TOS_HAS_MATCHES_MASK
    }

    /// Clears bits 7/6 of the IPv4 TOS byte in place. Called by the
    /// terminal hop before forwarding a reconciled data packet (§4.2.a).
    pub fn clear_matches_flag(&mut self) {
        let ip_start = ETHERNET_HEADER_LEN;
        self.tos &= !TOS_HAS_MATCHES_MASK;
        self.raw[ip_start + 1] = self.tos;
    }

    pub fn into_raw(self) -> BytesMut {
        self.raw
    }

    /// Builds an envelope directly from its fields, bypassing wire parsing.
    /// Used by other modules' test suites that need a cheap `PacketEnvelope`
    /// without constructing a well-formed Ethernet frame.
    #[cfg(any(test, feature = "test-util"))]
    pub fn synthetic(five_tuple: FiveTuple, seq_key: u32, captured_at: Instant) -> Self {
        Self {
            raw: BytesMut::zeroed(34),
            captured_at,
            seq_key,
            five_tuple,
            total_len: 34,
            tos: 0,
            ttl: 64,
            payload_range: 34..34,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_udp_frame(tos: u8, src_port: u16, dst_port: u16, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0u8; 12]); // dst + src MAC
        buf.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        let total_len = 20 + 8 + payload.len();
        buf.extend_from_slice(&[
            0x45,
            tos,
            (total_len >> 8) as u8,
            total_len as u8,
            0,
            0,
            0,
            0,
            64,
            17, // UDP
            0,
            0,
        ]);
        buf.extend_from_slice(&[10, 0, 0, 1]);
        buf.extend_from_slice(&[10, 0, 0, 2]);
        buf.extend_from_slice(&src_port.to_be_bytes());
        buf.extend_from_slice(&dst_port.to_be_bytes());
        buf.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        buf.extend_from_slice(&0x1234u16.to_be_bytes()); // checksum / seq_key
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn parses_udp_five_tuple_and_seq_key() {
        let frame = ipv4_udp_frame(0x00, 4444, 53, b"test");
        let env = PacketEnvelope::parse(frame, Instant::now()).unwrap();
        assert_eq!(env.five_tuple.src_port, 4444);
        assert_eq!(env.five_tuple.dst_port, 53);
        assert_eq!(env.five_tuple.proto, Proto::Udp);
        assert_eq!(env.seq_key, 0x1234);
        assert_eq!(env.payload(), b"test");
        assert!(!env.has_matches());
    }

    #[test]
    fn clear_matches_flag_zeroes_high_tos_bits() {
        let frame = ipv4_udp_frame(0xC0, 1, 2, b"");
        let mut env = PacketEnvelope::parse(frame, Instant::now()).unwrap();
        assert!(env.has_matches());
        env.clear_matches_flag();
        assert!(!env.has_matches());
        assert_eq!(env.tos, 0x00);
    }

    #[test]
    fn rejects_non_ipv4_ethertype() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0u8; 12]);
        buf.extend_from_slice(&0x86DDu16.to_be_bytes()); // IPv6
        buf.extend_from_slice(&[0u8; 40]);
        assert_eq!(PacketEnvelope::parse(buf, Instant::now()).unwrap_err(), ParseError::NotIpv4);
    }
}
