//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut, TryGetError};

use crate::mac_addr::MacAddr;

// Extension methods for Bytes.
pub trait BytesExt {
    /// Gets an IPv6 addr from `self` in big-endian byte order.
    ///
    /// The current position is advanced by 16.
    fn try_get_ipv6(&mut self) -> Result<Ipv6Addr, TryGetError>;

    /// Gets a 48-bit MAC address from `self`.
    ///
    /// The current position is advanced by 6.
    fn try_get_mac(&mut self) -> Result<MacAddr, TryGetError>;
}

// Extension methods for BytesMut.
pub trait BytesMutExt {
    /// Writes an IPv6 addr to `self` in big-endian byte order.
    ///
    /// The current position is advanced by 16.
    fn put_ipv6(&mut self, addr: &Ipv6Addr);

    /// Writes a 48-bit MAC address to `self`.
    ///
    /// The current position is advanced by 6.
    fn put_mac(&mut self, addr: &MacAddr);

    /// Writes `n` zeroed bytes to `self`.
    fn put_zeroes(&mut self, n: usize);
}

// ===== impl Bytes =====

impl BytesExt for Bytes {
    fn try_get_ipv6(&mut self) -> Result<Ipv6Addr, TryGetError> {
        self.try_get_u128().map(Ipv6Addr::from)
    }

    fn try_get_mac(&mut self) -> Result<MacAddr, TryGetError> {
        if self.remaining() < MacAddr::LENGTH {
            return Err(TryGetError {
                requested: MacAddr::LENGTH,
                available: self.remaining(),
            });
        }
        let mut mac = [0; MacAddr::LENGTH];
        self.copy_to_slice(&mut mac);
        Ok(MacAddr::from(mac))
    }
}

// ===== impl BytesMut =====

impl BytesMutExt for BytesMut {
    fn put_ipv6(&mut self, addr: &Ipv6Addr) {
        self.put_slice(&addr.octets())
    }

    fn put_mac(&mut self, addr: &MacAddr) {
        self.put_slice(&addr.as_bytes())
    }

    fn put_zeroes(&mut self, n: usize) {
        self.put_bytes(0, n)
    }
}

// ===== unit tests =====
