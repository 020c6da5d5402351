//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::Bytes;
use const_addrs::ip4;
use netcore::arp::{ArpOp, ArpPacket};
use netcore::device::NetProto;
use netcore_utils::mac_addr::MacAddr;

use super::{Fixture, MAC1, MAC2};

fn request(sha: [u8; 6], spa: &str, tpa: &str) -> Bytes {
    ArpPacket {
        op: ArpOp::Request,
        sha: sha.into(),
        spa: spa.parse().unwrap(),
        tha: MacAddr::UNSPECIFIED,
        tpa: tpa.parse().unwrap(),
    }
    .encode()
}

fn fixture() -> Fixture {
    let fx = Fixture::new();
    fx.stack()
        .ipv4_add(
            fx.if_nbr,
            ip4!("192.168.1.10"),
            ip4!("255.255.255.0"),
            None,
        )
        .unwrap();
    fx
}

#[tokio::test(start_paused = true)]
async fn reply_to_request() {
    let fx = fixture();
    let data = request(MAC2, "192.168.1.20", "192.168.1.10");
    fx.inject(
        NetProto::Arp,
        ip4!("192.168.1.20"),
        ip4!("192.168.1.10"),
        Some(MAC2),
        &data,
    )
    .await;

    let sent = fx.take_sent(NetProto::Arp);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].dst_mac, Some(MAC2.into()));
    assert_eq!(sent[0].dst, ip4!("192.168.1.20"));

    let reply = ArpPacket::decode(&mut sent[0].data.clone()).unwrap();
    assert_eq!(reply.op, ArpOp::Reply);
    assert_eq!(reply.sha, MAC1.into());
    assert_eq!(reply.spa, ip4!("192.168.1.10"));
    assert_eq!(reply.tha, MAC2.into());
    assert_eq!(reply.tpa, ip4!("192.168.1.20"));
}

#[tokio::test(start_paused = true)]
async fn ignore_request_for_other_host() {
    let fx = fixture();
    let data = request(MAC2, "192.168.1.20", "192.168.1.30");
    fx.inject(
        NetProto::Arp,
        ip4!("192.168.1.20"),
        ip4!("192.168.1.30"),
        Some(MAC2),
        &data,
    )
    .await;

    assert!(fx.dev.take_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn ignore_own_request() {
    let fx = fixture();
    let data = request(MAC1, "192.168.1.10", "192.168.1.10");
    fx.inject(
        NetProto::Arp,
        ip4!("192.168.1.10"),
        ip4!("192.168.1.10"),
        Some(MAC1),
        &data,
    )
    .await;

    assert!(fx.dev.take_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn malformed_packet_dropped() {
    let fx = fixture();
    fx.inject(
        NetProto::Arp,
        ip4!("192.168.1.20"),
        ip4!("192.168.1.10"),
        Some(MAC2),
        &[0x00, 0x01, 0x08, 0x00],
    )
    .await;

    assert!(fx.dev.take_sent().is_empty());
    // The receive buffer still went back to its pool.
    let stats = fx.stack().buf_stats(fx.if_nbr).unwrap();
    assert_eq!(stats.rx_large.entries_used, 0);
}
