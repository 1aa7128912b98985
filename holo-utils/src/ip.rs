//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv6Addr};

use ipnetwork::{IpNetwork, Ipv6Network};
use serde::{Deserialize, Serialize};

// IP version of a subnet or address.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum IpVersion {
    V4,
    V6,
}

// Extension methods for IpAddr.
pub trait IpAddrExt {
    // Returns the textual form of the address, with IPv6 addresses fully
    // expanded (eight groups of four hex digits).
    fn to_expanded(&self) -> String;
}

// Extension methods for Ipv6Addr.
pub trait Ipv6AddrExt {
    // Link-scope all-nodes multicast address.
    const ALL_NODES: Ipv6Addr;

    // Returns the solicited-node multicast address for this address
    // (ff02::1:ffXX:XXXX, RFC 4291 section 2.7.1).
    fn solicited_node(&self) -> Ipv6Addr;

    // Returns the fully expanded textual form of this address.
    fn to_expanded(&self) -> String;
}

// Extension methods for Ipv6Network.
pub trait Ipv6NetworkExt {
    // Apply mask to prefix.
    #[must_use]
    fn apply_mask(&self) -> Ipv6Network;
}

// ===== impl IpVersion =====

impl std::fmt::Display for IpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "IPv4"),
            IpVersion::V6 => write!(f, "IPv6"),
        }
    }
}

// ===== impl IpAddr =====

impl IpAddrExt for IpAddr {
    fn to_expanded(&self) -> String {
        match self {
            IpAddr::V4(addr) => addr.to_string(),
            IpAddr::V6(addr) => Ipv6AddrExt::to_expanded(addr),
        }
    }
}

// ===== impl Ipv6Addr =====

impl Ipv6AddrExt for Ipv6Addr {
    const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

    fn solicited_node(&self) -> Ipv6Addr {
        let octets = self.octets();
        Ipv6Addr::new(
            0xff02,
            0,
            0,
            0,
            0,
            1,
            0xff00 | octets[13] as u16,
            u16::from_be_bytes([octets[14], octets[15]]),
        )
    }

    fn to_expanded(&self) -> String {
        let segments = self.segments();
        segments
            .iter()
            .map(|segment| format!("{segment:04x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

// ===== impl Ipv6Network =====

impl Ipv6NetworkExt for Ipv6Network {
    fn apply_mask(&self) -> Ipv6Network {
        Ipv6Network::new(self.network(), self.prefix()).unwrap_or(*self)
    }
}

// ===== global functions =====

// Parses an IP address given in any valid textual form.
//
// The returned value is the canonical 128-bit (or 32-bit) representation, so
// two textual spellings of the same address always compare equal.
pub fn normalize(text: &str) -> Option<IpAddr> {
    text.trim().parse::<IpAddr>().ok()
}

// Rewrites an IP address given in any valid textual form into its fully
// expanded form. Expanding an already expanded address is a no-op.
pub fn expand(text: &str) -> Option<String> {
    normalize(text).map(|addr| addr.to_expanded())
}

// Returns the IPv6 network of the given prefix, if it's an IPv6 one.
pub fn ipv6_network(prefix: &IpNetwork) -> Option<Ipv6Network> {
    match prefix {
        IpNetwork::V6(prefix) => Some(prefix.apply_mask()),
        IpNetwork::V4(_) => None,
    }
}

// ===== unit tests =====
