//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use enum_as_inner::EnumAsInner;
use netcore_utils::bytes::{BytesExt, BytesMutExt};
use netcore_utils::mac_addr::MacAddr;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::icmp::Icmpv6Type;
use crate::packet::{
    DecodeError, DecodeResult, update_icmpv6_cksum, verify_icmpv6_cksum,
};

// Neighbor Discovery option types (RFC 4861, section 4.6).
const OPT_SRC_LLADDR: u8 = 1;
const OPT_TGT_LLADDR: u8 = 2;

// Neighbor Discovery messages processed by the host.
#[derive(Clone, Debug, EnumAsInner, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Packet {
    NeighborSolicit(NeighborSolicit),
    NeighborAdvert(NeighborAdvert),
}

// Neighbor Solicitation (RFC 4861, section 4.3).
//
// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |     Code      |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                           Reserved                            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                                                               +
// |                       Target Address                          |
// +                                                               +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   Options ...
// +-+-+-+-+-+-+-+-+-+-+-+-
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NeighborSolicit {
    pub target: Ipv6Addr,
    pub src_lladdr: Option<MacAddr>,
}

// Neighbor Advertisement (RFC 4861, section 4.4).
//
// Same layout as the solicitation, with the R, S and O flags in the first
// three bits of the reserved field.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NeighborAdvert {
    pub flags: NaFlags,
    pub target: Ipv6Addr,
    pub tgt_lladdr: Option<MacAddr>,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct NaFlags: u32 {
        const ROUTER = 0x8000_0000;
        const SOLICITED = 0x4000_0000;
        const OVERRIDE = 0x2000_0000;
    }
}

// ===== impl Packet =====

impl Packet {
    const HDR_LENGTH: usize = 24;

    pub fn decode(
        src: &Ipv6Addr,
        dst: &Ipv6Addr,
        buf: &mut Bytes,
    ) -> DecodeResult<Self> {
        if buf.len() < Self::HDR_LENGTH {
            return Err(DecodeError::InsufficientData);
        }
        verify_icmpv6_cksum(src, dst, &buf[..])?;

        let pkt_type = buf.get_u8();
        let pkt_type = match Icmpv6Type::from_u8(pkt_type) {
            Some(
                pkt_type @ (Icmpv6Type::NeighborSolicit
                | Icmpv6Type::NeighborAdvert),
            ) => pkt_type,
            _ => return Err(DecodeError::UnknownPacketType(pkt_type)),
        };
        let code = buf.get_u8();
        if code != 0 {
            return Err(DecodeError::InvalidCode(code));
        }
        let _cksum = buf.get_u16();
        let flags = buf.get_u32();
        let target = buf.get_ipv6();
        let (src_lladdr, tgt_lladdr) = decode_options(buf)?;

        let packet = match pkt_type {
            Icmpv6Type::NeighborSolicit => {
                Packet::NeighborSolicit(NeighborSolicit { target, src_lladdr })
            }
            _ => Packet::NeighborAdvert(NeighborAdvert {
                flags: NaFlags::from_bits_truncate(flags),
                target,
                tgt_lladdr,
            }),
        };
        Ok(packet)
    }

    pub fn encode(&self, src: &Ipv6Addr, dst: &Ipv6Addr) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::HDR_LENGTH + 8);

        let (pkt_type, flags, target, option) = match self {
            Packet::NeighborSolicit(ns) => (
                Icmpv6Type::NeighborSolicit,
                0,
                ns.target,
                ns.src_lladdr.map(|mac| (OPT_SRC_LLADDR, mac)),
            ),
            Packet::NeighborAdvert(na) => (
                Icmpv6Type::NeighborAdvert,
                na.flags.bits(),
                na.target,
                na.tgt_lladdr.map(|mac| (OPT_TGT_LLADDR, mac)),
            ),
        };
        buf.put_u8(pkt_type as u8);
        buf.put_u8(0);
        // The checksum will be rewritten later.
        buf.put_u16(0);
        buf.put_u32(flags);
        buf.put_ipv6(&target);
        if let Some((opt_type, mac)) = option {
            buf.put_u8(opt_type);
            // Length in units of 8 octets.
            buf.put_u8(1);
            buf.put_mac(&mac);
        }
        update_icmpv6_cksum(src, dst, &mut buf);

        buf.freeze()
    }
}

// ===== helper functions =====

// Walks the option list, keeping the link-layer address options and
// skipping everything else.
fn decode_options(
    buf: &mut Bytes,
) -> DecodeResult<(Option<MacAddr>, Option<MacAddr>)> {
    let mut src_lladdr = None;
    let mut tgt_lladdr = None;

    while buf.remaining() >= 2 {
        let opt_type = buf.get_u8();
        let opt_len = buf.get_u8() as usize * 8;
        if opt_len == 0 || opt_len - 2 > buf.remaining() {
            return Err(DecodeError::InvalidOption(opt_type));
        }
        let mut opt = buf.split_to(opt_len - 2);

        match opt_type {
            OPT_SRC_LLADDR | OPT_TGT_LLADDR => {
                if opt.remaining() < MacAddr::LENGTH {
                    return Err(DecodeError::InvalidOption(opt_type));
                }
                let mac = opt.get_mac();
                if opt_type == OPT_SRC_LLADDR {
                    src_lladdr = Some(mac);
                } else {
                    tgt_lladdr = Some(mac);
                }
            }
            _ => (),
        }
    }

    Ok((src_lladdr, tgt_lladdr))
}
