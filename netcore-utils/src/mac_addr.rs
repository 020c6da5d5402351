//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// 48-bit MAC address (IEEE EUI-48 format).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct MacAddr([u8; 6]);

/// Error type for MAC address parsing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseMacAddrError;

// ===== impl MacAddr =====

impl MacAddr {
    pub const LENGTH: usize = 6;
    pub const BROADCAST: Self = Self([0xff; 6]);
    pub const UNSPECIFIED: Self = Self([0x00; 6]);

    pub fn as_bytes(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// Maps an IPv4 multicast group onto its Ethernet multicast address
    /// (RFC 1112, section 6.4).
    pub fn from_ipv4_mcast(group: &Ipv4Addr) -> MacAddr {
        let octets = group.octets();
        MacAddr([0x01, 0x00, 0x5e, octets[1] & 0x7f, octets[2], octets[3]])
    }

    /// Maps an IPv6 multicast group onto its Ethernet multicast address
    /// (RFC 2464, section 7).
    pub fn from_ipv6_mcast(group: &Ipv6Addr) -> MacAddr {
        let octets = group.octets();
        MacAddr([0x33, 0x33, octets[12], octets[13], octets[14], octets[15]])
    }

    /// Builds the link-local IPv6 address whose interface identifier is the
    /// modified EUI-64 form of this MAC address (RFC 4291, appendix A).
    pub fn to_link_local_ipv6(&self) -> Ipv6Addr {
        let m = self.0;
        Ipv6Addr::from([
            0xfe,
            0x80,
            0,
            0,
            0,
            0,
            0,
            0,
            m[0] ^ 0x02,
            m[1],
            m[2],
            0xff,
            0xfe,
            m[3],
            m[4],
            m[5],
        ])
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

impl FromStr for MacAddr {
    type Err = ParseMacAddrError;

    // Accepts colon or hyphen separated hex octets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep = if s.contains(':') { ':' } else { '-' };
        let mut bytes = [0u8; 6];
        let mut count = 0;
        for part in s.split(sep) {
            if count == bytes.len() || part.len() != 2 {
                return Err(ParseMacAddrError);
            }
            bytes[count] =
                u8::from_str_radix(part, 16).map_err(|_| ParseMacAddrError)?;
            count += 1;
        }
        if count != bytes.len() {
            return Err(ParseMacAddrError);
        }

        Ok(MacAddr(bytes))
    }
}

// ===== impl ParseMacAddrError =====

impl std::fmt::Display for ParseMacAddrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid MAC address format")
    }
}

impl std::error::Error for ParseMacAddrError {}
