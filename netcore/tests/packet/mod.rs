//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::Bytes;
use const_addrs::{ip4, ip6};
use netcore::arp::{ArpOp, ArpPacket};
use netcore::assert_eq_hex;
use netcore::dhcp::packet::{DhcpPacket, MessageType};
use netcore::icmp::EchoPacket;
use netcore::igmp::{self, PacketType as IgmpPacketType};
use netcore::mld::{self, PacketType as MldPacketType};
use netcore::ndp::packet::{NaFlags, NeighborAdvert, NeighborSolicit, Packet};
use netcore::packet::DecodeError;
use netcore_utils::mac_addr::MacAddr;

const MAC1: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];

//
// IGMP.
//

#[test]
fn igmp_report_encode() {
    let pkt = igmp::Packet::report(ip4!("225.1.2.3"));
    assert_eq_hex!(
        pkt.encode()[..],
        [0x12, 0x00, 0x0a, 0xfb, 0xe1, 0x01, 0x02, 0x03]
    );
}

#[test]
fn igmp_general_query_decode() {
    let mut buf =
        Bytes::from_static(&[0x11, 0x64, 0xee, 0x9b, 0x00, 0x00, 0x00, 0x00]);
    let pkt = igmp::Packet::decode(&mut buf).unwrap();
    assert_eq!(pkt.pkt_type, IgmpPacketType::MembershipQuery);
    assert_eq!(pkt.max_resp_time, 100);
    assert_eq!(pkt.query_group(), None);
    assert!(!pkt.is_report());
}

#[test]
fn igmp_bad_checksum() {
    let mut buf =
        Bytes::from_static(&[0x12, 0x00, 0x0a, 0xfa, 0xe1, 0x01, 0x02, 0x03]);
    assert_eq!(
        igmp::Packet::decode(&mut buf),
        Err(DecodeError::InvalidChecksum)
    );
}

#[test]
fn igmp_truncated() {
    let mut buf = Bytes::from_static(&[0x12, 0x00, 0x0a, 0xfb]);
    assert_eq!(
        igmp::Packet::decode(&mut buf),
        Err(DecodeError::InsufficientData)
    );
}

//
// MLD.
//

#[test]
fn mld_report_decode_encoded() {
    let src = ip6!("fe80::1");
    let dst = ip6!("ff02::1:3");
    let pkt = mld::Packet::report(ip6!("ff02::1:3"));
    let mut buf = pkt.encode(&src, &dst);
    assert_eq!(buf.len(), 24);
    assert_eq!(buf[0], 131);

    let decoded = mld::Packet::decode(&src, &dst, &mut buf).unwrap();
    assert_eq!(decoded.pkt_type, MldPacketType::Report);
    assert_eq!(decoded.group, ip6!("ff02::1:3"));
}

#[test]
fn mld_pseudo_header_checksum() {
    let src = ip6!("fe80::1");
    let dst = ip6!("ff02::2");
    let mut buf = mld::Packet::done(ip6!("ff05::5")).encode(&src, &dst);

    // The checksum covers the IPv6 pseudo-header.
    let other = ip6!("fe80::2");
    assert_eq!(
        mld::Packet::decode(&other, &dst, &mut buf),
        Err(DecodeError::InvalidChecksum)
    );
}

//
// ARP.
//

#[test]
fn arp_probe_encode() {
    let pkt = ArpPacket::probe(MacAddr::from(MAC1), ip4!("169.254.10.20"));
    assert!(pkt.is_probe());
    assert_eq_hex!(
        pkt.encode()[..],
        [
            0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0x02, 0x00,
            0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0xa9, 0xfe, 0x0a, 0x14,
        ]
    );
}

#[test]
fn arp_announce_decode() {
    let mut buf = Bytes::from_static(&[
        0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0x02, 0x00, 0x00,
        0x00, 0x00, 0x01, 0xc0, 0xa8, 0x01, 0x0a, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0xc0, 0xa8, 0x01, 0x0a,
    ]);
    let pkt = ArpPacket::decode(&mut buf).unwrap();
    assert_eq!(
        pkt,
        ArpPacket::announce(MacAddr::from(MAC1), ip4!("192.168.1.10"))
    );
    assert_eq!(pkt.op, ArpOp::Request);
    assert!(!pkt.is_probe());
}

#[test]
fn arp_invalid_hardware_type() {
    let mut buf = Bytes::from_static(&[
        0x00, 0x06, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0x02, 0x00, 0x00,
        0x00, 0x00, 0x01, 0xc0, 0xa8, 0x01, 0x0a, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0xc0, 0xa8, 0x01, 0x0a,
    ]);
    assert_eq!(
        ArpPacket::decode(&mut buf),
        Err(DecodeError::InvalidHardwareType(6))
    );
}

#[test]
fn arp_conflict_detection() {
    let own = MacAddr::from(MAC1);
    let peer = MacAddr::from([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
    let addr = ip4!("169.254.10.20");

    // Another host probing for the same address.
    assert!(ArpPacket::probe(peer, addr).conflicts_with(&addr, &own));
    // Another host already using it.
    assert!(ArpPacket::announce(peer, addr).conflicts_with(&addr, &own));
    // Our own packets looped back.
    assert!(!ArpPacket::probe(own, addr).conflicts_with(&addr, &own));
    // Unrelated traffic.
    let other = ip4!("169.254.10.21");
    assert!(!ArpPacket::announce(peer, other).conflicts_with(&addr, &own));
}

//
// ICMP echo.
//

#[test]
fn icmpv4_echo_request_encode() {
    let pkt = EchoPacket::request(0x1234, 1, Bytes::from_static(b"abcd"));
    assert_eq!(pkt.length(), 12);
    assert_eq_hex!(
        pkt.encode_v4()[..],
        [
            0x08, 0x00, 0x21, 0x04, 0x12, 0x34, 0x00, 0x01, 0x61, 0x62,
            0x63, 0x64,
        ]
    );
}

#[test]
fn icmpv4_echo_reply_decode() {
    let request = EchoPacket::request(0x1234, 1, Bytes::from_static(b"abcd"));
    let mut buf = request.reply().encode_v4();
    assert_eq!(buf[0], 0);

    let pkt = EchoPacket::decode_v4(&mut buf).unwrap();
    assert!(!pkt.request);
    assert_eq!(pkt.id, 0x1234);
    assert_eq!(pkt.seq, 1);
    assert_eq!(pkt.data, Bytes::from_static(b"abcd"));
}

#[test]
fn icmpv6_echo_request_decode() {
    let src = ip6!("2001:db8::1");
    let dst = ip6!("2001:db8::2");
    let request = EchoPacket::request(7, 42, Bytes::from_static(b"ping"));
    let mut buf = request.encode_v6(&src, &dst);
    assert_eq!(buf[0], 128);

    let pkt = EchoPacket::decode_v6(&src, &dst, &mut buf).unwrap();
    assert_eq!(pkt, request);
}

#[test]
fn icmpv4_echo_corrupted() {
    let pkt = EchoPacket::request(0x1234, 1, Bytes::from_static(b"abcd"));
    let mut data = pkt.encode_v4().to_vec();
    data[9] ^= 0xff;
    let mut buf = Bytes::from(data);
    assert_eq!(
        EchoPacket::decode_v4(&mut buf),
        Err(DecodeError::InvalidChecksum)
    );
}

//
// DHCP.
//

#[test]
fn dhcp_discover_encode() {
    let mut pkt =
        DhcpPacket::client(MessageType::Discover, 0xdead_beef, MAC1.into());
    pkt.broadcast = true;
    let buf = pkt.encode();

    assert_eq!(buf.len(), 300);
    assert_eq_hex!(buf[0..4], [0x01, 0x01, 0x06, 0x00]);
    assert_eq_hex!(buf[4..8], [0xde, 0xad, 0xbe, 0xef]);
    assert_eq_hex!(buf[10..12], [0x80, 0x00]);
    assert_eq_hex!(buf[28..34], MAC1);
    assert_eq_hex!(buf[236..240], [0x63, 0x82, 0x53, 0x63]);
    assert_eq_hex!(buf[240..243], [53, 1, 1]);
}

#[test]
fn dhcp_offer_decode() {
    let mut offer =
        DhcpPacket::client(MessageType::Offer, 0x0102_0304, MAC1.into());
    offer.reply = true;
    offer.yiaddr = ip4!("192.168.1.50");
    offer.options.subnet_mask = Some(ip4!("255.255.255.0"));
    offer.options.router = Some(ip4!("192.168.1.1"));
    offer.options.server_id = Some(ip4!("192.168.1.1"));
    offer.options.lease_time = Some(3600);

    let mut buf = offer.encode();
    let pkt = DhcpPacket::decode(&mut buf).unwrap();
    assert_eq!(pkt, offer);
    assert_eq!(pkt.msg_type, MessageType::Offer);
    assert_eq!(pkt.options.requested_addr, None::<Ipv4Addr>);
}

#[test]
fn dhcp_truncated() {
    let pkt = DhcpPacket::client(MessageType::Discover, 1, MAC1.into());
    let mut buf = pkt.encode().slice(..200);
    assert_eq!(
        DhcpPacket::decode(&mut buf),
        Err(DecodeError::InsufficientData)
    );
}

#[test]
fn dhcp_missing_message_type() {
    let pkt = DhcpPacket::client(MessageType::Discover, 1, MAC1.into());
    let mut data = pkt.encode().to_vec();
    // Replace option 53 with padding.
    data[240..243].copy_from_slice(&[0, 0, 0]);
    let mut buf = Bytes::from(data);
    assert_eq!(
        DhcpPacket::decode(&mut buf),
        Err(DecodeError::MissingOption(53))
    );
}

#[test]
fn dhcp_bad_magic_cookie() {
    let pkt = DhcpPacket::client(MessageType::Request, 1, MAC1.into());
    let mut data = pkt.encode().to_vec();
    data[236] = 0;
    let mut buf = Bytes::from(data);
    assert_eq!(
        DhcpPacket::decode(&mut buf),
        Err(DecodeError::InvalidMagicCookie(0x0082_5363))
    );
}

//
// Neighbor discovery.
//

#[test]
fn ndp_neighbor_solicit() {
    let src = ip6!("fe80::2");
    let dst = ip6!("ff02::1:ff00:1");
    let ns = Packet::NeighborSolicit(NeighborSolicit {
        target: ip6!("fe80::1"),
        src_lladdr: Some(MAC1.into()),
    });
    let mut buf = ns.encode(&src, &dst);
    assert_eq!(buf.len(), 32);
    assert_eq_hex!(buf[24..26], [0x01, 0x01]);

    assert_eq!(Packet::decode(&src, &dst, &mut buf), Ok(ns));
}

#[test]
fn ndp_neighbor_advert() {
    let src = ip6!("fe80::1");
    let dst = ip6!("fe80::2");
    let na = Packet::NeighborAdvert(NeighborAdvert {
        flags: NaFlags::SOLICITED | NaFlags::OVERRIDE,
        target: ip6!("fe80::1"),
        tgt_lladdr: Some(MAC1.into()),
    });
    let mut buf = na.encode(&src, &dst);
    assert_eq!(buf[0], 136);
    assert_eq_hex!(buf[4..8], [0x60, 0x00, 0x00, 0x00]);
    assert_eq_hex!(buf[24..26], [0x02, 0x01]);

    assert_eq!(Packet::decode(&src, &dst, &mut buf), Ok(na));
}

#[test]
fn ndp_dad_solicit_without_option() {
    let src = ip6!("::");
    let dst = ip6!("ff02::1:ff00:1");
    let ns = Packet::NeighborSolicit(NeighborSolicit {
        target: ip6!("2001:db8::1"),
        src_lladdr: None,
    });
    let mut buf = ns.encode(&src, &dst);
    assert_eq!(buf.len(), 24);

    assert_eq!(Packet::decode(&src, &dst, &mut buf), Ok(ns));
}
