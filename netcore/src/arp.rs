//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use netcore_utils::bytes::{BytesExt, BytesMutExt};
use netcore_utils::mac_addr::MacAddr;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::device::NetProto;
use crate::error::Error;
use crate::interface::Link;
use crate::packet::{DecodeError, DecodeResult};

const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;

// ARP packet for IPv4 over Ethernet (RFC 826).
//
// Only probes and announcements (RFC 5227) are originated; address
// resolution itself happens below the device boundary.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ArpPacket {
    pub op: ArpOp,
    pub sha: MacAddr,
    pub spa: Ipv4Addr,
    pub tha: MacAddr,
    pub tpa: Ipv4Addr,
}

#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

// ===== impl ArpPacket =====

impl ArpPacket {
    pub const LENGTH: usize = 28;

    // Probe for `target`, sent with an unspecified sender address.
    pub fn probe(sha: MacAddr, target: Ipv4Addr) -> ArpPacket {
        ArpPacket {
            op: ArpOp::Request,
            sha,
            spa: Ipv4Addr::UNSPECIFIED,
            tha: MacAddr::UNSPECIFIED,
            tpa: target,
        }
    }

    // Gratuitous request claiming `addr`.
    pub fn announce(sha: MacAddr, addr: Ipv4Addr) -> ArpPacket {
        ArpPacket {
            op: ArpOp::Request,
            sha,
            spa: addr,
            tha: MacAddr::UNSPECIFIED,
            tpa: addr,
        }
    }

    pub fn is_probe(&self) -> bool {
        self.spa.is_unspecified()
    }

    /// Returns true if this packet, sent by a host other than `own_mac`,
    /// shows `addr` is used or being probed by someone else.
    pub fn conflicts_with(&self, addr: &Ipv4Addr, own_mac: &MacAddr) -> bool {
        if self.sha == *own_mac {
            return false;
        }
        self.spa == *addr || (self.is_probe() && self.tpa == *addr)
    }

    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.len() < Self::LENGTH {
            return Err(DecodeError::InsufficientData);
        }

        let htype = buf.get_u16();
        if htype != HTYPE_ETHERNET {
            return Err(DecodeError::InvalidHardwareType(htype));
        }
        let ptype = buf.get_u16();
        if ptype != PTYPE_IPV4 {
            return Err(DecodeError::InvalidProtocolType(ptype));
        }
        let hlen = buf.get_u8();
        let plen = buf.get_u8();
        if hlen as usize != MacAddr::LENGTH || plen != 4 {
            return Err(DecodeError::InvalidLength(hlen as usize));
        }
        let op = buf.get_u16();
        let Some(op) = ArpOp::from_u16(op) else {
            return Err(DecodeError::InvalidOperation(op));
        };
        let sha = buf.get_mac();
        let spa = buf.get_ipv4();
        let tha = buf.get_mac();
        let tpa = buf.get_ipv4();

        Ok(ArpPacket {
            op,
            sha,
            spa,
            tha,
            tpa,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LENGTH);

        buf.put_u16(HTYPE_ETHERNET);
        buf.put_u16(PTYPE_IPV4);
        buf.put_u8(MacAddr::LENGTH as u8);
        buf.put_u8(4);
        buf.put_u16(self.op as u16);
        buf.put_mac(&self.sha);
        buf.put_ipv4(&self.spa);
        buf.put_mac(&self.tha);
        buf.put_ipv4(&self.tpa);

        buf.freeze()
    }
}

// ===== global functions =====

// Broadcasts an ARP packet on the link.
pub(crate) fn send(link: &mut Link, packet: &ArpPacket) -> Result<(), Error> {
    link.send(
        NetProto::Arp,
        packet.spa.into(),
        packet.tpa.into(),
        Some(MacAddr::BROADCAST),
        &packet.encode(),
    )
}
