//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::Serialize;
use serde::de::DeserializeOwned;

// Extension methods for Ipv4Addr.
//
// The classful predicates follow the historical address classes, which are
// still what an embedded host uses to sanity check configured addresses.
pub trait Ipv4AddrExt {
    // Returns true if this is an usable unicast address.
    fn is_usable(&self) -> bool;

    // Class A: 0.0.0.0 - 127.255.255.255.
    fn is_class_a(&self) -> bool;

    // Class B: 128.0.0.0 - 191.255.255.255.
    fn is_class_b(&self) -> bool;

    // Class C: 192.0.0.0 - 223.255.255.255.
    fn is_class_c(&self) -> bool;

    // Class D (multicast): 224.0.0.0 - 239.255.255.255.
    fn is_class_d(&self) -> bool;

    // Returns true for the "this host on this network" block (0.0.0.0/8).
    fn is_this_host(&self) -> bool;

    // Returns true if this address is a valid subnet mask: a left-aligned
    // contiguous run of set bits.
    fn is_valid_subnet_mask(&self) -> bool;

    // Returns the prefix length of this subnet mask, if valid.
    fn mask_prefixlen(&self) -> Option<u8>;

    // Returns true if this address may be configured as a host address.
    fn is_valid_host(&self) -> bool;

    // Returns true if this address may be configured as a host address
    // under the given subnet mask (non-zero, non-broadcast host portion).
    fn is_valid_host_in(&self, mask: Ipv4Addr) -> bool;
}

// Extension methods for Ipv6Addr.
pub trait Ipv6AddrExt {
    const ALL_NODES: Ipv6Addr;
    const ALL_ROUTERS: Ipv6Addr;

    // Returns true if this is an usable unicast address.
    fn is_usable(&self) -> bool;

    // Returns true for link-local unicast addresses (fe80::/10).
    fn is_link_local_unicast(&self) -> bool;

    // Returns true for link-local scoped multicast addresses (ffx2::/16).
    fn is_link_local_multicast(&self) -> bool;

    // Returns the solicited-node multicast address for this address.
    fn solicited_node(&self) -> Ipv6Addr;
}

pub trait IpAddrKind:
    std::fmt::Debug
    + std::fmt::Display
    + Clone
    + Copy
    + Eq
    + std::hash::Hash
    + Ord
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + DeserializeOwned
    + Serialize
    + Into<IpAddr>
{
    fn is_multicast(&self) -> bool;
}

// ===== impl Ipv4Addr =====

impl Ipv4AddrExt for Ipv4Addr {
    fn is_usable(&self) -> bool {
        !(self.is_loopback()
            || self.is_broadcast()
            || self.is_multicast()
            || self.is_unspecified())
    }

    fn is_class_a(&self) -> bool {
        self.octets()[0] & 0x80 == 0x00
    }

    fn is_class_b(&self) -> bool {
        self.octets()[0] & 0xc0 == 0x80
    }

    fn is_class_c(&self) -> bool {
        self.octets()[0] & 0xe0 == 0xc0
    }

    fn is_class_d(&self) -> bool {
        self.octets()[0] & 0xf0 == 0xe0
    }

    fn is_this_host(&self) -> bool {
        self.octets()[0] == 0
    }

    fn is_valid_subnet_mask(&self) -> bool {
        let mask = u32::from(*self);
        mask != 0 && mask.leading_ones() + mask.trailing_zeros() == 32
    }

    fn mask_prefixlen(&self) -> Option<u8> {
        self.is_valid_subnet_mask()
            .then(|| u32::from(*self).leading_ones() as u8)
    }

    fn is_valid_host(&self) -> bool {
        (self.is_class_a() || self.is_class_b() || self.is_class_c())
            && !self.is_this_host()
            && !self.is_loopback()
    }

    fn is_valid_host_in(&self, mask: Ipv4Addr) -> bool {
        let Some(prefixlen) = mask.mask_prefixlen() else {
            return false;
        };
        if !self.is_valid_host() {
            return false;
        }

        // Point-to-point (/31) and host (/32) prefixes have no reserved
        // network or broadcast address.
        if prefixlen >= 31 {
            return true;
        }

        let host_mask = !u32::from(mask);
        let host = u32::from(*self) & host_mask;
        host != 0 && host != host_mask
    }
}

impl IpAddrKind for Ipv4Addr {
    fn is_multicast(&self) -> bool {
        Ipv4Addr::is_multicast(self)
    }
}

// ===== impl Ipv6Addr =====

impl Ipv6AddrExt for Ipv6Addr {
    const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);
    const ALL_ROUTERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);

    fn is_usable(&self) -> bool {
        !(self.is_loopback() || self.is_multicast() || self.is_unspecified())
    }

    fn is_link_local_unicast(&self) -> bool {
        self.segments()[0] & 0xffc0 == 0xfe80
    }

    fn is_link_local_multicast(&self) -> bool {
        self.is_multicast() && self.segments()[0] & 0x000f == 0x0002
    }

    fn solicited_node(&self) -> Ipv6Addr {
        let octets = self.octets();
        Ipv6Addr::new(
            0xff02,
            0,
            0,
            0,
            0,
            0x0001,
            0xff00 | octets[13] as u16,
            u16::from_be_bytes([octets[14], octets[15]]),
        )
    }
}

impl IpAddrKind for Ipv6Addr {
    fn is_multicast(&self) -> bool {
        Ipv6Addr::is_multicast(self)
    }
}
