//! Flow identity (§3, §4.4): a 7-tuple, canonicalized at lookup so both
//! packet directions hash to the same entry.

use std::net::Ipv4Addr;

use crate::wire::Proto;

/// One endpoint of a flow, used only to build a canonical `FlowKey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub a: Endpoint,
    pub b: Endpoint,
    pub protocol: Proto,
    pub vlan_id: u16,
    pub address_space_id: u16,
}

impl FlowKey {
    /// Orders the two endpoints by `(ip, port)` so a packet from either
    /// direction produces the same key; `initiator_is_a` records which
    /// endpoint was the original client so per-direction state stays
    /// distinguishable after canonicalization.
    pub fn canonical(
        client: Endpoint,
        server: Endpoint,
        protocol: Proto,
        vlan_id: u16,
        address_space_id: u16,
    ) -> (FlowKey, bool) {
        let client_first = (client.ip, client.port) <= (server.ip, server.port);
        let (a, b) = if client_first { (client, server) } else { (server, client) };
        let key = FlowKey { a, b, protocol, vlan_id, address_space_id };
        (key, client_first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_directions_canonicalize_to_the_same_key() {
        let client = Endpoint { ip: Ipv4Addr::new(10, 0, 0, 2), port: 5555 };
        let server = Endpoint { ip: Ipv4Addr::new(10, 0, 0, 1), port: 80 };

        let (forward, forward_is_initiator) = FlowKey::canonical(client, server, Proto::Tcp, 0, 0);
        let (reverse, reverse_is_initiator) = FlowKey::canonical(server, client, Proto::Tcp, 0, 0);

        assert_eq!(forward, reverse);
        assert!(forward_is_initiator);
        assert!(!reverse_is_initiator);
    }
}
