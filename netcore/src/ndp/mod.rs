//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//
//
// IPv6 Neighbor Discovery, host side (RFC 4861), and duplicate address
// detection (RFC 4862, section 5.4).
//

pub mod dad;
pub mod neighbor;
pub mod packet;

use std::net::Ipv6Addr;

use netcore_utils::UnboundedSender;
use netcore_utils::ip::Ipv6AddrExt;
use netcore_utils::mac_addr::MacAddr;

use crate::config::NdpCfg;
use crate::device::NetProto;
use crate::error::Error;
use crate::interface::Link;
use crate::ndp::packet::{NaFlags, NeighborAdvert, NeighborSolicit, Packet};
use crate::tasks::messages::input::NbrTimeoutMsg;

// What the neighbor cache needs from its surroundings.
pub(crate) struct NdpCtx<'a> {
    pub link: &'a mut Link,
    pub cfg: &'a NdpCfg,
    // Source address for solicitations, if the interface has one.
    pub src: Option<Ipv6Addr>,
    pub nbr_timeoutp: &'a UnboundedSender<NbrTimeoutMsg>,
}

// ===== global functions =====

// Sends a Neighbor Solicitation for `target`.
//
// Multicast solicitations go to the target's solicited-node group. DAD
// probes use the unspecified source and carry no link-layer option.
pub(crate) fn send_ns(
    link: &mut Link,
    src: Ipv6Addr,
    target: Ipv6Addr,
    unicast_mac: Option<MacAddr>,
) -> Result<(), Error> {
    let (dst, dst_mac) = match unicast_mac {
        Some(mac) => (target, mac),
        None => {
            let group = target.solicited_node();
            (group, MacAddr::from_ipv6_mcast(&group))
        }
    };
    let src_lladdr = (!src.is_unspecified()).then_some(link.mac);
    let packet =
        Packet::NeighborSolicit(NeighborSolicit { target, src_lladdr });

    link.send(
        NetProto::Icmpv6,
        src.into(),
        dst.into(),
        Some(dst_mac),
        &packet.encode(&src, &dst),
    )
}

// Sends a Neighbor Advertisement for one of our addresses.
pub(crate) fn send_na(
    link: &mut Link,
    src: Ipv6Addr,
    dst: Ipv6Addr,
    dst_mac: MacAddr,
    flags: NaFlags,
) -> Result<(), Error> {
    let packet = Packet::NeighborAdvert(NeighborAdvert {
        flags,
        target: src,
        tgt_lladdr: Some(link.mac),
    });

    link.send(
        NetProto::Icmpv6,
        src.into(),
        dst.into(),
        Some(dst_mac),
        &packet.encode(&src, &dst),
    )
}
