//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use bytes::Bytes;
use const_addrs::{ip4, ip6};
use netcore::config::Config;
use netcore::device::NetProto;
use netcore::error::Error;
use netcore::icmp::EchoPacket;
use netcore::test::TxRecord;

use super::{Fixture, MAC2};

const TIMEOUT: Duration = Duration::from_secs(2);

fn fixture_v4(config: Config) -> Fixture {
    let fx = Fixture::with_config(config);
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

// Addresses are usable right away with duplicate address detection off.
fn fixture_v6() -> Fixture {
    let mut config = Config::default();
    config.ndp.solicit_max_dad = 0;
    let fx = Fixture::with_config(config);
    fx.stack()
        .ipv6_add(fx.if_nbr, ip6!("2001:db8::1"), 64, None)
        .unwrap();
    fx
}

// Echo messages sent so far, leaving out MLD and neighbor discovery.
fn take_echo_v6(fx: &Fixture) -> Vec<TxRecord> {
    fx.take_sent(NetProto::Icmpv6)
        .into_iter()
        .filter(|record| matches!(record.data[0], 128 | 129))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn ipv4_request_and_reply() {
    let fx = fixture_v4(Config::default());
    let handle = fx
        .stack()
        .tx_echo_req(ip4!("192.168.1.20").into(), TIMEOUT, b"hello")
        .unwrap();

    let sent = fx.take_sent(NetProto::Icmpv4);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].src, ip4!("192.168.1.10"));
    assert_eq!(sent[0].dst, ip4!("192.168.1.20"));
    assert_eq!(sent[0].dst_mac, None);
    let request = EchoPacket::decode_v4(&mut sent[0].data.clone()).unwrap();
    assert!(request.request);
    assert_eq!(request.id, handle.id());
    assert_eq!(request.seq, handle.seq());
    assert_eq!(request.data, Bytes::from_static(b"hello"));
    assert_eq!(fx.stack().echo().outstanding(), 1);

    advance_ms(30).await;
    fx.inject(
        NetProto::Icmpv4,
        ip4!("192.168.1.20"),
        ip4!("192.168.1.10"),
        Some(MAC2),
        &request.reply().encode_v4(),
    )
    .await;

    let rtt = handle.wait().await.unwrap();
    assert!(rtt >= Duration::from_millis(30));
    assert_eq!(fx.stack().echo().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn ipv4_request_timeout() {
    let fx = fixture_v4(Config::default());
    let handle = fx
        .stack()
        .tx_echo_req(ip4!("192.168.1.20").into(), TIMEOUT, b"hello")
        .unwrap();

    let result = handle.wait().await;
    assert!(matches!(result, Err(Error::EchoTimeout(_))));
    assert_eq!(fx.stack().echo().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn ipv4_reply_data_mismatch() {
    let fx = fixture_v4(Config::default());
    let handle = fx
        .stack()
        .tx_echo_req(ip4!("192.168.1.20").into(), TIMEOUT, b"hello")
        .unwrap();

    let reply = EchoPacket::request(
        handle.id(),
        handle.seq(),
        Bytes::from_static(b"world"),
    )
    .reply();
    fx.inject(
        NetProto::Icmpv4,
        ip4!("192.168.1.20"),
        ip4!("192.168.1.10"),
        Some(MAC2),
        &reply.encode_v4(),
    )
    .await;

    let result = handle.wait().await;
    assert!(matches!(result, Err(Error::EchoDataMismatch(_))));
}

#[tokio::test(start_paused = true)]
async fn ipv4_reply_from_wrong_host() {
    let fx = fixture_v4(Config::default());
    let handle = fx
        .stack()
        .tx_echo_req(ip4!("192.168.1.20").into(), TIMEOUT, b"hello")
        .unwrap();

    let reply = EchoPacket::request(
        handle.id(),
        handle.seq(),
        Bytes::from_static(b"hello"),
    )
    .reply();
    fx.inject(
        NetProto::Icmpv4,
        ip4!("192.168.1.30"),
        ip4!("192.168.1.10"),
        Some(MAC2),
        &reply.encode_v4(),
    )
    .await;

    assert_eq!(fx.stack().echo().outstanding(), 1);
    let result = handle.wait().await;
    assert!(matches!(result, Err(Error::EchoTimeout(_))));
}

#[tokio::test(start_paused = true)]
async fn no_source_address() {
    let fx = Fixture::new();
    let result = fx.stack().tx_echo_req(
        ip4!("192.168.1.20").into(),
        TIMEOUT,
        b"hello",
    );
    assert!(matches!(result, Err(Error::NoSourceAddr(_))));
    assert!(fx.dev.take_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn request_table_full() {
    let mut config = Config::default();
    config.icmp.echo_req_max = 2;
    let fx = fixture_v4(config);
    let dest = ip4!("192.168.1.20").into();

    let first = fx.stack().tx_echo_req(dest, TIMEOUT, b"a").unwrap();
    let second = fx.stack().tx_echo_req(dest, TIMEOUT, b"b").unwrap();
    assert_ne!(first.seq(), second.seq());
    let result = fx.stack().tx_echo_req(dest, TIMEOUT, b"c");
    assert!(matches!(result, Err(Error::EchoTableFull)));

    // Dropping a handle frees its slot.
    drop(first);
    assert!(fx.stack().tx_echo_req(dest, TIMEOUT, b"c").is_ok());
}

#[tokio::test(start_paused = true)]
async fn ipv4_answer_request() {
    let fx = fixture_v4(Config::default());
    let request = EchoPacket::request(0x4242, 7, Bytes::from_static(b"ping"));
    fx.inject(
        NetProto::Icmpv4,
        ip4!("192.168.1.20"),
        ip4!("192.168.1.10"),
        Some(MAC2),
        &request.encode_v4(),
    )
    .await;

    let sent = fx.take_sent(NetProto::Icmpv4);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].src, ip4!("192.168.1.10"));
    assert_eq!(sent[0].dst, ip4!("192.168.1.20"));
    assert_eq!(sent[0].dst_mac, Some(MAC2.into()));
    let reply = EchoPacket::decode_v4(&mut sent[0].data.clone()).unwrap();
    assert_eq!(reply, request.reply());
}

#[tokio::test(start_paused = true)]
async fn ipv4_ignore_request_for_other_host() {
    let fx = fixture_v4(Config::default());
    let request = EchoPacket::request(0x4242, 7, Bytes::from_static(b"ping"));
    fx.inject(
        NetProto::Icmpv4,
        ip4!("192.168.1.20"),
        ip4!("192.168.1.99"),
        Some(MAC2),
        &request.encode_v4(),
    )
    .await;

    assert!(fx.take_sent(NetProto::Icmpv4).is_empty());
}

#[tokio::test(start_paused = true)]
async fn ipv6_answer_request() {
    let fx = fixture_v6();
    let src = ip6!("2001:db8::2");
    let dst = ip6!("2001:db8::1");
    let request = EchoPacket::request(9, 1, Bytes::from_static(b"ping6"));
    fx.inject(
        NetProto::Icmpv6,
        src,
        dst,
        Some(MAC2),
        &request.encode_v6(&src, &dst),
    )
    .await;

    let sent = take_echo_v6(&fx);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].src, dst);
    assert_eq!(sent[0].dst, src);
    assert_eq!(sent[0].dst_mac, Some(MAC2.into()));
    let reply =
        EchoPacket::decode_v6(&dst, &src, &mut sent[0].data.clone()).unwrap();
    assert_eq!(reply, request.reply());
}

#[tokio::test(start_paused = true)]
async fn ipv6_reply_matches_request() {
    let fx = fixture_v6();
    let src = ip6!("2001:db8::1");
    let dst = ip6!("2001:db8::2");
    let handle = fx
        .stack()
        .tx_echo_req(dst.into(), TIMEOUT, b"hello6")
        .unwrap();

    let reply = EchoPacket::request(
        handle.id(),
        handle.seq(),
        Bytes::from_static(b"hello6"),
    )
    .reply();
    fx.inject(
        NetProto::Icmpv6,
        dst,
        src,
        Some(MAC2),
        &reply.encode_v6(&dst, &src),
    )
    .await;

    assert!(handle.wait().await.is_ok());
    // The request itself waits on address resolution.
    assert!(take_echo_v6(&fx).is_empty());
}

async fn advance_ms(ms: u64) {
    super::advance(Duration::from_millis(ms)).await;
}
