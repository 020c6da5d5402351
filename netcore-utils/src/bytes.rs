//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::mac_addr::MacAddr;

// Extension methods for Bytes.
pub trait BytesExt {
    /// Gets an IPv4 addr from `self` in big-endian byte order.
    ///
    /// The current position is advanced by 4.
    fn get_ipv4(&mut self) -> Ipv4Addr;

    /// Gets an IPv6 addr from `self` in big-endian byte order.
    ///
    /// The current position is advanced by 16.
    fn get_ipv6(&mut self) -> Ipv6Addr;

    /// Gets an EUI-48 MAC address from `self`.
    ///
    /// The current position is advanced by 6.
    fn get_mac(&mut self) -> MacAddr;
}

// Extension methods for BytesMut.
pub trait BytesMutExt {
    /// Writes an IPv4 addr to `self` in big-endian byte order.
    ///
    /// The current position is advanced by 4.
    fn put_ipv4(&mut self, addr: &Ipv4Addr);

    /// Writes an IPv6 addr to `self` in big-endian byte order.
    ///
    /// The current position is advanced by 16.
    fn put_ipv6(&mut self, addr: &Ipv6Addr);

    /// Writes an EUI-48 MAC address to `self`.
    ///
    /// The current position is advanced by 6.
    fn put_mac(&mut self, addr: &MacAddr);
}

// ===== impl Bytes =====

impl BytesExt for Bytes {
    fn get_ipv4(&mut self) -> Ipv4Addr {
        Ipv4Addr::from(self.get_u32())
    }

    fn get_ipv6(&mut self) -> Ipv6Addr {
        Ipv6Addr::from(self.get_u128())
    }

    fn get_mac(&mut self) -> MacAddr {
        let mut octets = [0; MacAddr::LENGTH];
        self.copy_to_slice(&mut octets);
        MacAddr::from(octets)
    }
}

// ===== impl BytesMut =====

impl BytesMutExt for BytesMut {
    fn put_ipv4(&mut self, addr: &Ipv4Addr) {
        self.put_slice(&addr.octets())
    }

    fn put_ipv6(&mut self, addr: &Ipv6Addr) {
        self.put_slice(&addr.octets())
    }

    fn put_mac(&mut self, addr: &MacAddr) {
        self.put_slice(&addr.as_bytes())
    }
}
