//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use netcore_utils::bytes::{BytesExt, BytesMutExt};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::icmp::Icmpv6Type;
use crate::packet::{
    DecodeError, DecodeResult, update_icmpv6_cksum, verify_icmpv6_cksum,
};

// MLDv1 message (RFC 2710, section 3).
//
// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |     Code      |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Maximum Response Delay    |          Reserved             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                                                               +
// |                       Multicast Address                       |
// +                                                               +
// |                                                               |
// +                                                               +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Packet {
    pub pkt_type: PacketType,
    // Milliseconds.
    pub max_resp_delay: u16,
    pub group: Ipv6Addr,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PacketType {
    Query,
    Report,
    Done,
}

// ===== impl Packet =====

impl Packet {
    pub const LENGTH: usize = 24;

    pub fn report(group: Ipv6Addr) -> Packet {
        Packet {
            pkt_type: PacketType::Report,
            max_resp_delay: 0,
            group,
        }
    }

    pub fn done(group: Ipv6Addr) -> Packet {
        Packet {
            pkt_type: PacketType::Done,
            max_resp_delay: 0,
            group,
        }
    }

    pub fn decode(
        src: &Ipv6Addr,
        dst: &Ipv6Addr,
        buf: &mut Bytes,
    ) -> DecodeResult<Self> {
        if buf.len() < Self::LENGTH {
            return Err(DecodeError::InsufficientData);
        }
        verify_icmpv6_cksum(src, dst, &buf[..])?;

        let pkt_type = buf.get_u8();
        let pkt_type = match Icmpv6Type::from_u8(pkt_type) {
            Some(Icmpv6Type::MldQuery) => PacketType::Query,
            Some(Icmpv6Type::MldReport) => PacketType::Report,
            Some(Icmpv6Type::MldDone) => PacketType::Done,
            _ => return Err(DecodeError::UnknownPacketType(pkt_type)),
        };
        let code = buf.get_u8();
        if code != 0 {
            return Err(DecodeError::InvalidCode(code));
        }
        let _cksum = buf.get_u16();
        let max_resp_delay = buf.get_u16();
        let _reserved = buf.get_u16();
        let group = buf.get_ipv6();

        Ok(Packet {
            pkt_type,
            max_resp_delay,
            group,
        })
    }

    pub fn encode(&self, src: &Ipv6Addr, dst: &Ipv6Addr) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LENGTH);

        let pkt_type = match self.pkt_type {
            PacketType::Query => Icmpv6Type::MldQuery,
            PacketType::Report => Icmpv6Type::MldReport,
            PacketType::Done => Icmpv6Type::MldDone,
        };
        buf.put_u8(pkt_type as u8);
        buf.put_u8(0);
        buf.put_u16(0);
        buf.put_u16(self.max_resp_delay);
        buf.put_u16(0);
        buf.put_ipv6(&self.group);
        update_icmpv6_cksum(src, dst, &mut buf);

        buf.freeze()
    }

    // General queries carry the unspecified address.
    pub fn query_group(&self) -> Option<Ipv6Addr> {
        (!self.group.is_unspecified()).then_some(self.group)
    }
}
