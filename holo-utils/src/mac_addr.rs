//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// 48-bit MAC address (IEEE EUI-48 format).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct MacAddr([u8; 6]);

// ===== impl MacAddr =====

impl MacAddr {
    pub const LENGTH: usize = 6;
    // Ethernet mapping of ff02::1 (RFC 2464, section 7).
    pub const ALL_NODES: Self = Self([0x33, 0x33, 0x00, 0x00, 0x00, 0x01]);

    pub fn as_bytes(&self) -> [u8; 6] {
        self.0
    }

    // Returns true if the group bit is set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    // Returns the Ethernet destination address that carries the given IPv6
    // multicast group (33:33 followed by the low-order 32 bits).
    pub fn from_ipv6_multicast(addr: &Ipv6Addr) -> MacAddr {
        let octets = addr.octets();
        MacAddr([0x33, 0x33, octets[12], octets[13], octets[14], octets[15]])
    }

    // Returns the modified EUI-64 interface identifier (RFC 4291, appendix A).
    pub fn to_eui64(&self) -> [u8; 8] {
        let m = self.0;
        [m[0] ^ 0x02, m[1], m[2], 0xff, 0xfe, m[3], m[4], m[5]]
    }

    // Returns the fe80::/64 link-local address derived from this MAC.
    pub fn to_link_local(&self) -> Ipv6Addr {
        let mut octets = [0; 16];
        octets[0] = 0xfe;
        octets[1] = 0x80;
        octets[8..].copy_from_slice(&self.to_eui64());
        Ipv6Addr::from(octets)
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        ))
    }
}

/// Error type for MAC address parsing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseMacAddrError;

impl std::fmt::Display for ParseMacAddrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid MAC address format")
    }
}

impl std::error::Error for ParseMacAddrError {}

impl FromStr for MacAddr {
    type Err = ParseMacAddrError;

    /// Parse a MAC address from a string.
    ///
    /// Accepts colon-separated ("aa:bb:cc:dd:ee:ff") and hyphen-separated
    /// ("aa-bb-cc-dd-ee-ff") forms, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep = if s.contains(':') {
            ':'
        } else if s.contains('-') {
            '-'
        } else {
            return Err(ParseMacAddrError);
        };

        let mut bytes = [0u8; 6];
        let mut count = 0;
        for part in s.split(sep) {
            if count == 6 || part.is_empty() || part.len() > 2 {
                return Err(ParseMacAddrError);
            }
            bytes[count] =
                u8::from_str_radix(part, 16).map_err(|_| ParseMacAddrError)?;
            count += 1;
        }
        if count != 6 {
            return Err(ParseMacAddrError);
        }

        Ok(MacAddr(bytes))
    }
}

// ===== unit tests =====
