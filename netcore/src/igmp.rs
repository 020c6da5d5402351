//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use netcore_utils::bytes::{BytesExt, BytesMutExt};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::packet::{DecodeError, DecodeResult, update_cksum, verify_cksum};

// IGMP message (RFC 1112 appendix I, RFC 2236 section 2).
//
// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |      Type     | Max Resp Time |           Checksum            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                         Group Address                         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
// IGMPv1 queries carry zero in the max response time field.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Packet {
    pub pkt_type: PacketType,
    pub max_resp_time: u8,
    pub group: Ipv4Addr,
}

// IGMP Packet Type.
//
// IANA registry:
// https://www.iana.org/assignments/igmp-type-numbers/igmp-type-numbers.xhtml#igmp-type-numbers-2
#[derive(Clone, Copy, Debug, Eq, Hash, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PacketType {
    MembershipQuery = 0x11,
    MembershipReportV1 = 0x12,
    MembershipReportV2 = 0x16,
    LeaveGroupV2 = 0x17,
}

// ===== impl Packet =====

impl Packet {
    pub const LENGTH: usize = 8;

    pub fn report(group: Ipv4Addr) -> Packet {
        Packet {
            pkt_type: PacketType::MembershipReportV1,
            max_resp_time: 0,
            group,
        }
    }

    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.len() < Self::LENGTH {
            return Err(DecodeError::InsufficientData);
        }
        verify_cksum(&buf[..Self::LENGTH])?;

        let pkt_type = buf.get_u8();
        let Some(pkt_type) = PacketType::from_u8(pkt_type) else {
            return Err(DecodeError::UnknownPacketType(pkt_type));
        };
        let max_resp_time = buf.get_u8();
        let _cksum = buf.get_u16();
        let group = buf.get_ipv4();

        Ok(Packet {
            pkt_type,
            max_resp_time,
            group,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LENGTH);

        buf.put_u8(self.pkt_type as u8);
        buf.put_u8(self.max_resp_time);
        // The checksum will be rewritten later.
        buf.put_u16(0);
        buf.put_ipv4(&self.group);
        update_cksum(&mut buf);

        buf.freeze()
    }

    // General queries carry the unspecified group address.
    pub fn query_group(&self) -> Option<Ipv4Addr> {
        (!self.group.is_unspecified()).then_some(self.group)
    }

    pub fn is_report(&self) -> bool {
        matches!(
            self.pkt_type,
            PacketType::MembershipReportV1 | PacketType::MembershipReportV2
        )
    }
}
