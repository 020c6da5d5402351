//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use generational_arena::Index;
use netcore_utils::ip::Ipv6AddrExt;
use netcore_utils::mac_addr::MacAddr;
use num_traits::FromPrimitive;

use crate::arp::{ArpOp, ArpPacket};
use crate::autoip;
use crate::config::NdpTimeoutKind;
use crate::conn::ConnProto;
use crate::debug::Debug;
use crate::device::{NetProto, NetRxPacketMsg};
use crate::dhcp::{self, packet::DhcpPacket};
use crate::error::Error;
use crate::icmp::{EchoPacket, Icmpv6Type};
use crate::igmp::{self, PacketType as IgmpPacketType};
use crate::interface::{IfNbr, Interface};
use crate::mld::{self, PacketType as MldPacketType};
use crate::ndp::packet::{NaFlags, NeighborAdvert, NeighborSolicit};
use crate::ndp::{self, packet::Packet as NdpPacket};
use crate::packet::DecodeError;
use crate::stack::{Stack, interface_mut};

// ===== Network packet receipt =====

pub(crate) fn process_packet(
    stack: &mut Stack,
    msg: NetRxPacketMsg,
) -> Result<(), Error> {
    Debug::PacketRx(&msg).log();

    let if_nbr = msg.if_nbr;
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;
    if !iface.up {
        return Ok(());
    }

    let proto = msg.proto;
    let mut buf = Bytes::copy_from_slice(msg.buf.data());
    // Release the receive buffer before any reply is built.
    drop(msg.buf);

    match (proto, msg.src, msg.dst) {
        (NetProto::Arp, ..) => {
            let arp = ArpPacket::decode(&mut buf)
                .map_err(decode_error(if_nbr, proto))?;
            process_arp(stack, if_nbr, arp)
        }
        (NetProto::Igmp, IpAddr::V4(src), _) => {
            let pkt = igmp::Packet::decode(&mut buf)
                .map_err(decode_error(if_nbr, proto))?;
            process_igmp(stack, if_nbr, src, pkt)
        }
        (NetProto::Icmpv4, IpAddr::V4(src), IpAddr::V4(dst)) => {
            let pkt = EchoPacket::decode_v4(&mut buf)
                .map_err(decode_error(if_nbr, proto))?;
            process_echo_v4(stack, if_nbr, src, dst, msg.src_mac, pkt)
        }
        (NetProto::Icmpv6, IpAddr::V6(src), IpAddr::V6(dst)) => {
            process_icmpv6(stack, if_nbr, src, dst, msg.src_mac, buf)
        }
        (NetProto::Udp { src_port, dst_port }, src, dst) => {
            let src = SocketAddr::new(src, src_port);
            let dst = SocketAddr::new(dst, dst_port);
            process_udp(stack, if_nbr, src, dst, buf)
        }
        (_, src, _) => {
            Debug::PacketIgnored(if_nbr, &src, "address family mismatch")
                .log();
            Ok(())
        }
    }
}

// ARP requests for our addresses are answered; every ARP packet is also
// checked for conflicts with addresses being configured.
fn process_arp(
    stack: &mut Stack,
    if_nbr: IfNbr,
    arp: ArpPacket,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;

    dhcp::process_arp(iface, &arp);
    if let Some((outcome, dhcp_fallback)) =
        autoip::process_arp(iface, &stack.tx, &arp)
    {
        if dhcp_fallback {
            dhcp::fallback_complete(iface, &outcome);
        }
    }

    if arp.op == ArpOp::Request
        && arp.sha != iface.link.mac
        && iface.ipv4.contains(&arp.tpa)
    {
        let reply = ArpPacket {
            op: ArpOp::Reply,
            sha: iface.link.mac,
            spa: arp.tpa,
            tha: arp.sha,
            tpa: arp.spa,
        };
        iface.link.send(
            NetProto::Arp,
            reply.spa.into(),
            reply.tpa.into(),
            Some(arp.sha),
            &reply.encode(),
        )?;
    }

    Ok(())
}

fn process_igmp(
    stack: &mut Stack,
    if_nbr: IfNbr,
    src: Ipv4Addr,
    pkt: igmp::Packet,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;

    match pkt.pkt_type {
        IgmpPacketType::MembershipQuery => {
            // IGMPv1 queries leave the response time unset.
            let max_resp = match pkt.max_resp_time {
                0 => Duration::from_secs(
                    stack.config.igmp.query_resp_max.into(),
                ),
                tenths => Duration::from_millis(u64::from(tenths) * 100),
            };
            let group = pkt.query_group();
            iface.igmp_with(&stack.config, &stack.tx, |igmp, ctx| {
                igmp.process_query(ctx, group, max_resp)
            });
        }
        _ if pkt.is_report() => {
            iface.igmp.process_report(&pkt.group);
        }
        _ => {
            Debug::PacketIgnored(if_nbr, &src.into(), "unsupported version")
                .log();
        }
    }

    Ok(())
}

fn process_echo_v4(
    stack: &mut Stack,
    if_nbr: IfNbr,
    src: Ipv4Addr,
    dst: Ipv4Addr,
    src_mac: Option<MacAddr>,
    pkt: EchoPacket,
) -> Result<(), Error> {
    if !pkt.request {
        stack.echo.process_reply(src.into(), &pkt);
        return Ok(());
    }

    Debug::EchoReqRx(if_nbr, &src.into(), pkt.id, pkt.seq).log();
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;
    if !iface.ipv4.contains(&dst) {
        Debug::PacketIgnored(if_nbr, &src.into(), "not addressed to us").log();
        return Ok(());
    }

    let reply = pkt.reply();
    iface.link.send(
        NetProto::Icmpv4,
        dst.into(),
        src.into(),
        src_mac,
        &reply.encode_v4(),
    )
}

// ICMPv6 messages are demultiplexed on their type.
fn process_icmpv6(
    stack: &mut Stack,
    if_nbr: IfNbr,
    src: Ipv6Addr,
    dst: Ipv6Addr,
    src_mac: Option<MacAddr>,
    mut buf: Bytes,
) -> Result<(), Error> {
    let proto = NetProto::Icmpv6;
    let Some(pkt_type) = buf.first().copied() else {
        return Err(decode_error(if_nbr, proto)(DecodeError::InsufficientData));
    };

    match Icmpv6Type::from_u8(pkt_type) {
        Some(Icmpv6Type::EchoRequest | Icmpv6Type::EchoReply) => {
            let pkt = EchoPacket::decode_v6(&src, &dst, &mut buf)
                .map_err(decode_error(if_nbr, proto))?;
            process_echo_v6(stack, if_nbr, src, dst, src_mac, pkt)
        }
        Some(
            Icmpv6Type::MldQuery | Icmpv6Type::MldReport | Icmpv6Type::MldDone,
        ) => {
            let pkt = mld::Packet::decode(&src, &dst, &mut buf)
                .map_err(decode_error(if_nbr, proto))?;
            process_mld(stack, if_nbr, pkt)
        }
        Some(Icmpv6Type::NeighborSolicit | Icmpv6Type::NeighborAdvert) => {
            let pkt = NdpPacket::decode(&src, &dst, &mut buf)
                .map_err(decode_error(if_nbr, proto))?;
            match pkt {
                NdpPacket::NeighborSolicit(ns) => {
                    process_ns(stack, if_nbr, src, src_mac, ns)
                }
                NdpPacket::NeighborAdvert(na) => {
                    process_na(stack, if_nbr, na)
                }
            }
        }
        Some(
            Icmpv6Type::RouterSolicit
            | Icmpv6Type::RouterAdvert
            | Icmpv6Type::Redirect,
        ) => {
            Debug::PacketIgnored(if_nbr, &src.into(), "router discovery")
                .log();
            Ok(())
        }
        None => {
            Debug::PacketIgnored(if_nbr, &src.into(), "unknown ICMPv6 type")
                .log();
            Ok(())
        }
    }
}

fn process_echo_v6(
    stack: &mut Stack,
    if_nbr: IfNbr,
    src: Ipv6Addr,
    dst: Ipv6Addr,
    src_mac: Option<MacAddr>,
    pkt: EchoPacket,
) -> Result<(), Error> {
    if !pkt.request {
        stack.echo.process_reply(src.into(), &pkt);
        return Ok(());
    }

    Debug::EchoReqRx(if_nbr, &src.into(), pkt.id, pkt.seq).log();
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;
    let reply_src = if dst.is_multicast() {
        if dst != Ipv6Addr::ALL_NODES && !iface.mld.is_joined(&dst) {
            Debug::PacketIgnored(if_nbr, &src.into(), "group not joined")
                .log();
            return Ok(());
        }
        iface.ipv6.get_source_for(&src)
    } else {
        iface.ipv6.is_preferred(&dst).then_some(dst)
    };
    let Some(reply_src) = reply_src else {
        Debug::PacketIgnored(if_nbr, &src.into(), "not addressed to us").log();
        return Ok(());
    };

    let reply = pkt.reply();
    let packet = iface.link.build(
        NetProto::Icmpv6,
        reply_src.into(),
        src.into(),
        src_mac,
        &reply.encode_v6(&reply_src, &src),
    )?;
    match src_mac {
        Some(_) => iface.link.transmit(packet),
        None => iface.ndp_send(&stack.config, &stack.tx, packet),
    }
}

fn process_mld(
    stack: &mut Stack,
    if_nbr: IfNbr,
    pkt: mld::Packet,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;

    match pkt.pkt_type {
        MldPacketType::Query => {
            let max_resp = Duration::from_millis(pkt.max_resp_delay.into());
            let group = pkt.query_group();
            iface.mld_with(&stack.config, &stack.tx, |mld, ctx| {
                mld.process_query(ctx, group, max_resp)
            });
        }
        MldPacketType::Report => {
            iface.mld.process_report(&pkt.group);
        }
        // Done messages only matter to routers.
        MldPacketType::Done => (),
    }

    Ok(())
}

// Neighbor Solicitation receipt (RFC 4861 section 7.2.3, RFC 4862 section
// 5.4.3).
fn process_ns(
    stack: &mut Stack,
    if_nbr: IfNbr,
    src: Ipv6Addr,
    src_mac: Option<MacAddr>,
    ns: NeighborSolicit,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;
    let target = ns.target;

    // Tentative target.
    if iface.dad.contains(&target) {
        // Another node is probing the same address.
        if src.is_unspecified() {
            iface.dad_conflict(&stack.config, &stack.tx, &target);
        }
        return Ok(());
    }

    if !iface.ipv6.is_preferred(&target) {
        Debug::PacketIgnored(if_nbr, &src.into(), "target not ours").log();
        return Ok(());
    }

    // Answer duplicate address detection probes on the all-nodes group.
    if src.is_unspecified() {
        let dst = Ipv6Addr::ALL_NODES;
        return ndp::send_na(
            &mut iface.link,
            target,
            dst,
            MacAddr::from_ipv6_mcast(&dst),
            NaFlags::OVERRIDE,
        );
    }

    iface.ndp_with(&stack.config, &stack.tx, |ndp, ctx| {
        ndp.process_ns(ctx, src, &ns)
    });
    let Some(dst_mac) = ns.src_lladdr.or(src_mac) else {
        Debug::PacketIgnored(if_nbr, &src.into(), "no link-layer address")
            .log();
        return Ok(());
    };
    ndp::send_na(
        &mut iface.link,
        target,
        src,
        dst_mac,
        NaFlags::SOLICITED | NaFlags::OVERRIDE,
    )
}

// Neighbor Advertisement receipt (RFC 4861 section 7.2.5, RFC 4862 section
// 5.4.4).
fn process_na(
    stack: &mut Stack,
    if_nbr: IfNbr,
    na: NeighborAdvert,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;

    if iface.dad.contains(&na.target) {
        iface.dad_conflict(&stack.config, &stack.tx, &na.target);
        return Ok(());
    }

    iface.ndp_with(&stack.config, &stack.tx, |ndp, ctx| {
        ndp.process_na(ctx, &na)
    });

    Ok(())
}

// UDP datagrams go to the DHCP client when one runs on the interface, and
// to the connection table otherwise.
fn process_udp(
    stack: &mut Stack,
    if_nbr: IfNbr,
    src: SocketAddr,
    dst: SocketAddr,
    mut buf: Bytes,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;

    if is_dhcp_reply(iface, &src, &dst) {
        let proto = NetProto::Udp {
            src_port: src.port(),
            dst_port: dst.port(),
        };
        let pkt = DhcpPacket::decode(&mut buf)
            .map_err(decode_error(if_nbr, proto))?;
        dhcp::process_packet(iface, &stack.tx, pkt);
        return Ok(());
    }

    if stack.conns.lookup(ConnProto::Udp, dst, src).is_none() {
        Debug::PacketIgnored(if_nbr, &src.ip(), "no matching connection")
            .log();
    }

    Ok(())
}

// ===== multicast report timer =====

pub(crate) fn process_group_report_timer(
    stack: &mut Stack,
    if_nbr: IfNbr,
    group: IpAddr,
    timer_gen: u64,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;

    match group {
        IpAddr::V4(group) => {
            iface.igmp_with(&stack.config, &stack.tx, |igmp, ctx| {
                igmp.process_report_timer(ctx, &group, timer_gen)
            });
        }
        IpAddr::V6(group) => {
            iface.mld_with(&stack.config, &stack.tx, |mld, ctx| {
                mld.process_report_timer(ctx, &group, timer_gen)
            });
        }
    }

    Ok(())
}

// ===== neighbor timeout =====

pub(crate) fn process_nbr_timeout(
    stack: &mut Stack,
    if_nbr: IfNbr,
    nbr_idx: Index,
    timer_gen: u64,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;

    iface.ndp_with(&stack.config, &stack.tx, |ndp, ctx| {
        ndp.process_timeout(ctx, nbr_idx, timer_gen)
    });

    Ok(())
}

// ===== duplicate address detection timeout =====

pub(crate) fn process_dad_timeout(
    stack: &mut Stack,
    if_nbr: IfNbr,
    addr: Ipv6Addr,
    timer_gen: u64,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;

    let interval = stack.config.ndp.timeout(NdpTimeoutKind::Solicit);
    if let Some(entry) = iface.dad.process_timeout(
        &mut iface.link,
        &addr,
        timer_gen,
        interval,
        &stack.tx.dad_timeout,
    ) {
        iface.dad_complete(entry);
    }

    Ok(())
}

// ===== DHCP timeout =====

pub(crate) fn process_dhcp_timeout(
    stack: &mut Stack,
    if_nbr: IfNbr,
    timer_gen: u64,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;

    dhcp::process_timeout(iface, &stack.config, &stack.tx, timer_gen);

    Ok(())
}

// ===== IPv4 link-local timeout =====

pub(crate) fn process_autoip_timeout(
    stack: &mut Stack,
    if_nbr: IfNbr,
    timer_gen: u64,
) -> Result<(), Error> {
    let iface = interface_mut(&mut stack.interfaces, if_nbr)?;

    if let Some((outcome, dhcp_fallback)) =
        autoip::process_timeout(iface, &stack.tx, timer_gen)
    {
        if dhcp_fallback {
            dhcp::fallback_complete(iface, &outcome);
        }
    }

    Ok(())
}

// ===== helper functions =====

fn decode_error(
    if_nbr: IfNbr,
    proto: NetProto,
) -> impl FnOnce(DecodeError) -> Error {
    move |error| Error::PacketDecodeError(if_nbr, proto, error)
}

fn is_dhcp_reply(
    iface: &Interface,
    src: &SocketAddr,
    dst: &SocketAddr,
) -> bool {
    iface.dhcp.as_ref().is_some_and(|session| {
        src.port() == session.cfg.server_port
            && dst.port() == session.cfg.client_port
    })
}
