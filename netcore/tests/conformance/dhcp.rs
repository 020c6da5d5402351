//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use const_addrs::ip4;
use netcore::arp::{ArpOp, ArpPacket};
use netcore::config::DhcpCfg;
use netcore::device::NetProto;
use netcore::dhcp::DhcpState;
use netcore::dhcp::packet::{DhcpPacket, MessageType};
use netcore::error::Error;
use netcore::hook::AddrCfgStatus;
use netcore::ipv4::AddrCfgMode;
use netcore::test::TxRecord;
use netcore_utils::mac_addr::MacAddr;

use super::{Fixture, HookRecorder, MAC1, MAC2, advance};

const ADDR: Ipv4Addr = ip4!("192.168.1.50");
const MASK: Ipv4Addr = ip4!("255.255.255.0");
const SERVER: Ipv4Addr = ip4!("192.168.1.1");
const CLIENT_PROTO: NetProto = NetProto::Udp {
    src_port: 68,
    dst_port: 67,
};
const SERVER_PROTO: NetProto = NetProto::Udp {
    src_port: 67,
    dst_port: 68,
};

fn no_validation() -> DhcpCfg {
    DhcpCfg {
        validate_addr: false,
        ..Default::default()
    }
}

fn session_xid(fx: &Fixture) -> u32 {
    let stack = fx.stack();
    let iface = stack.interface(fx.if_nbr).unwrap();
    iface.dhcp.as_ref().unwrap().xid
}

fn session_state(fx: &Fixture) -> DhcpState {
    let stack = fx.stack();
    let iface = stack.interface(fx.if_nbr).unwrap();
    iface.dhcp.as_ref().unwrap().state
}

// Server message answering the current transaction.
fn reply(fx: &Fixture, msg_type: MessageType, lease_time: u32) -> DhcpPacket {
    let mut pkt = DhcpPacket::client(msg_type, session_xid(fx), MAC1.into());
    pkt.reply = true;
    pkt.yiaddr = ADDR;
    pkt.options.subnet_mask = Some(MASK);
    pkt.options.router = Some(SERVER);
    pkt.options.server_id = Some(SERVER);
    pkt.options.lease_time = Some(lease_time);
    pkt
}

async fn send_reply(fx: &Fixture, pkt: &DhcpPacket) {
    let dst = Ipv4Addr::BROADCAST;
    let data = pkt.encode();
    fx.inject(SERVER_PROTO, SERVER, dst, Some(MAC2), &data).await;
}

fn take_dhcp(fx: &Fixture) -> Vec<(TxRecord, DhcpPacket)> {
    fx.take_sent(CLIENT_PROTO)
        .into_iter()
        .map(|record| {
            let pkt = DhcpPacket::decode(&mut record.data.clone()).unwrap();
            (record, pkt)
        })
        .collect()
}

fn take_msg_types(fx: &Fixture) -> Vec<MessageType> {
    take_dhcp(fx).into_iter().map(|(_, pkt)| pkt.msg_type).collect()
}

// Runs the exchange up to a bound lease.
async fn bind(fx: &Fixture, hook: &HookRecorder, lease_time: u32) {
    fx.stack()
        .dhcp_start(fx.if_nbr, no_validation(), hook.hook())
        .unwrap();
    send_reply(fx, &reply(fx, MessageType::Offer, lease_time)).await;
    send_reply(fx, &reply(fx, MessageType::Ack, lease_time)).await;
    assert_eq!(session_state(fx), DhcpState::Bound);
    fx.dev.take_sent();
}

#[tokio::test(start_paused = true)]
async fn discover_offer_request_ack() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    fx.stack()
        .dhcp_start(fx.if_nbr, no_validation(), hook.hook())
        .unwrap();
    assert_eq!(
        fx.stack().dhcp_status(fx.if_nbr).unwrap(),
        AddrCfgStatus::InProgress
    );

    let msgs = take_dhcp(&fx);
    assert_eq!(msgs.len(), 1);
    let (record, discover) = &msgs[0];
    assert_eq!(record.src, Ipv4Addr::UNSPECIFIED);
    assert_eq!(record.dst, Ipv4Addr::BROADCAST);
    assert_eq!(record.dst_mac, Some(MacAddr::BROADCAST));
    assert_eq!(discover.msg_type, MessageType::Discover);
    assert_eq!(discover.chaddr, MAC1.into());
    assert!(discover.broadcast);
    assert!(discover.options.param_req_list.is_some());

    send_reply(&fx, &reply(&fx, MessageType::Offer, 3600)).await;
    let msgs = take_dhcp(&fx);
    assert_eq!(msgs.len(), 1);
    let (_, request) = &msgs[0];
    assert_eq!(request.msg_type, MessageType::Request);
    assert_eq!(request.xid, discover.xid);
    assert_eq!(request.options.requested_addr, Some(ADDR));
    assert_eq!(request.options.server_id, Some(SERVER));
    assert_eq!(session_state(&fx), DhcpState::Requesting);

    send_reply(&fx, &reply(&fx, MessageType::Ack, 3600)).await;
    let outcomes = hook.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, AddrCfgStatus::Success);
    assert!(!outcomes[0].status.is_failure());
    assert_eq!(outcomes[0].addr, Some(ADDR.into()));
    assert_eq!(outcomes[0].mask, Some(MASK));
    assert_eq!(outcomes[0].gateway, Some(SERVER));

    let stack = fx.stack();
    assert_eq!(stack.dhcp_status(fx.if_nbr).unwrap(), AddrCfgStatus::Success);
    assert!(stack.is_cfgd(&ADDR));
    let iface = stack.interface(fx.if_nbr).unwrap();
    let session = iface.dhcp.as_ref().unwrap();
    assert_eq!(session.state, DhcpState::Bound);
    assert_eq!(session.lease.as_ref().unwrap().renewal_time, 1800);
    let remaining = session.timer_remaining().unwrap();
    assert!(remaining > Duration::from_secs(1799));
    assert!(remaining <= Duration::from_secs(1800));
}

#[tokio::test(start_paused = true)]
async fn validate_offered_address() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    let cfg = DhcpCfg::default();
    fx.stack().dhcp_start(fx.if_nbr, cfg, hook.hook()).unwrap();
    send_reply(&fx, &reply(&fx, MessageType::Offer, 3600)).await;
    send_reply(&fx, &reply(&fx, MessageType::Ack, 3600)).await;

    assert_eq!(session_state(&fx), DhcpState::Validating);
    let sent = fx.take_sent(NetProto::Arp);
    assert_eq!(sent.len(), 1);
    let probe = ArpPacket::decode(&mut sent[0].data.clone()).unwrap();
    assert!(probe.is_probe());
    assert_eq!(probe.tpa, ADDR);
    assert!(hook.take().is_empty());
    assert!(!fx.stack().is_cfgd(&ADDR));

    advance(Duration::from_millis(1100)).await;
    let outcomes = hook.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, AddrCfgStatus::Success);
    assert!(fx.stack().is_cfgd(&ADDR));
}

#[tokio::test(start_paused = true)]
async fn offered_address_in_use() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    let cfg = DhcpCfg::default();
    fx.stack().dhcp_start(fx.if_nbr, cfg, hook.hook()).unwrap();
    send_reply(&fx, &reply(&fx, MessageType::Offer, 3600)).await;
    send_reply(&fx, &reply(&fx, MessageType::Ack, 3600)).await;
    take_dhcp(&fx);

    // The current owner answers the probe.
    let data = ArpPacket {
        op: ArpOp::Reply,
        sha: MAC2.into(),
        spa: ADDR,
        tha: MAC1.into(),
        tpa: Ipv4Addr::UNSPECIFIED,
    }
    .encode();
    let dst = Ipv4Addr::UNSPECIFIED;
    fx.inject(NetProto::Arp, ADDR, dst, Some(MAC2), &data).await;

    let msgs = take_dhcp(&fx);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].1.msg_type, MessageType::Decline);
    assert_eq!(msgs[0].1.options.requested_addr, Some(ADDR));

    let outcomes = hook.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, AddrCfgStatus::FailAddrUsed);
    assert!(!fx.stack().is_cfgd(&ADDR));
    assert_eq!(session_state(&fx), DhcpState::Stopped);

    // The expired validation timer changes nothing.
    advance(Duration::from_secs(2)).await;
    assert!(hook.take().is_empty());
    assert!(!fx.stack().is_cfgd(&ADDR));
}

#[tokio::test(start_paused = true)]
async fn request_refused() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    fx.stack()
        .dhcp_start(fx.if_nbr, no_validation(), hook.hook())
        .unwrap();
    send_reply(&fx, &reply(&fx, MessageType::Offer, 3600)).await;
    send_reply(&fx, &reply(&fx, MessageType::Nak, 3600)).await;

    let outcomes = hook.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, AddrCfgStatus::FailNakRx);
    assert_eq!(outcomes[0].addr, None);
    assert_eq!(
        fx.stack().dhcp_status(fx.if_nbr).unwrap(),
        AddrCfgStatus::FailNakRx
    );
}

#[tokio::test(start_paused = true)]
async fn no_server() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    fx.stack()
        .dhcp_start(fx.if_nbr, no_validation(), hook.hook())
        .unwrap();
    let xid = session_xid(&fx);

    // Retransmissions back off exponentially.
    advance(Duration::from_secs(4)).await;
    assert_eq!(take_msg_types(&fx), [MessageType::Discover]);
    advance(Duration::from_secs(2)).await;
    assert_eq!(take_msg_types(&fx), [MessageType::Discover]);
    advance(Duration::from_secs(10)).await;
    assert_eq!(take_msg_types(&fx), [MessageType::Discover]);
    advance(Duration::from_secs(20)).await;
    let msgs = take_dhcp(&fx);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].1.xid, xid);

    advance(Duration::from_secs(38)).await;
    assert!(hook.take().is_empty());
    advance(Duration::from_secs(2)).await;
    let outcomes = hook.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, AddrCfgStatus::FailNoServer);
    assert!(outcomes[0].status.is_failure());
    assert_eq!(outcomes[0].error, None);
    assert!(take_dhcp(&fx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn ignore_other_transaction() {
    let fx = Fixture::new();
    fx.stack()
        .dhcp_start(fx.if_nbr, no_validation(), None)
        .unwrap();
    take_dhcp(&fx);

    let mut pkt = reply(&fx, MessageType::Offer, 3600);
    pkt.xid = pkt.xid.wrapping_add(1);
    send_reply(&fx, &pkt).await;
    let mut pkt = reply(&fx, MessageType::Offer, 3600);
    pkt.chaddr = MAC2.into();
    send_reply(&fx, &pkt).await;

    assert!(take_dhcp(&fx).is_empty());
    assert_eq!(session_state(&fx), DhcpState::Selecting);
}

#[tokio::test(start_paused = true)]
async fn classful_mask() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    fx.stack()
        .dhcp_start(fx.if_nbr, no_validation(), hook.hook())
        .unwrap();
    let addr = ip4!("10.1.2.3");
    for msg_type in [MessageType::Offer, MessageType::Ack] {
        let mut pkt = reply(&fx, msg_type, 3600);
        pkt.yiaddr = addr;
        pkt.options.subnet_mask = None;
        pkt.options.router = None;
        send_reply(&fx, &pkt).await;
    }

    let outcomes = hook.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].addr, Some(addr.into()));
    assert_eq!(outcomes[0].mask, Some(ip4!("255.0.0.0")));
    assert_eq!(outcomes[0].gateway, None);
}

#[tokio::test(start_paused = true)]
async fn infinite_lease() {
    let fx = Fixture::new();
    fx.stack()
        .dhcp_start(fx.if_nbr, no_validation(), None)
        .unwrap();
    for msg_type in [MessageType::Offer, MessageType::Ack] {
        let mut pkt = reply(&fx, msg_type, 0);
        pkt.options.lease_time = None;
        send_reply(&fx, &pkt).await;
    }

    let stack = fx.stack();
    let iface = stack.interface(fx.if_nbr).unwrap();
    let session = iface.dhcp.as_ref().unwrap();
    assert_eq!(session.state, DhcpState::Bound);
    assert_eq!(session.timer_remaining(), None);
}

#[tokio::test(start_paused = true)]
async fn renew_lease() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    bind(&fx, &hook, 100).await;
    assert_eq!(hook.take().len(), 1);

    advance(Duration::from_secs(51)).await;
    assert_eq!(session_state(&fx), DhcpState::Renewing);
    let msgs = take_dhcp(&fx);
    assert_eq!(msgs.len(), 1);
    let (record, request) = &msgs[0];
    assert_eq!(record.src, ADDR);
    assert_eq!(record.dst, SERVER);
    assert_eq!(record.dst_mac, None);
    assert_eq!(request.msg_type, MessageType::Request);
    assert_eq!(request.ciaddr, ADDR);
    assert!(fx.stack().is_cfgd(&ADDR));

    send_reply(&fx, &reply(&fx, MessageType::Ack, 200)).await;
    assert_eq!(session_state(&fx), DhcpState::Bound);
    assert!(fx.stack().is_cfgd(&ADDR));
    assert!(hook.take().is_empty());
    {
        let stack = fx.stack();
        let iface = stack.interface(fx.if_nbr).unwrap();
        let session = iface.dhcp.as_ref().unwrap();
        assert_eq!(session.lease.as_ref().unwrap().lease_time, 200);
    }

    // The new lease rearms renewal at half its length.
    advance(Duration::from_secs(99)).await;
    assert!(take_dhcp(&fx).is_empty());
    advance(Duration::from_secs(2)).await;
    assert_eq!(take_msg_types(&fx), [MessageType::Request]);
}

#[tokio::test(start_paused = true)]
async fn lease_expiry() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    bind(&fx, &hook, 100).await;
    hook.take();

    advance(Duration::from_secs(51)).await;
    assert_eq!(take_msg_types(&fx), [MessageType::Request]);

    // No answer until the lease runs out.
    advance(Duration::from_secs(50)).await;
    assert!(!fx.stack().is_cfgd(&ADDR));
    assert_eq!(session_state(&fx), DhcpState::Selecting);
    assert_eq!(take_msg_types(&fx), [MessageType::Discover]);
    assert_eq!(
        fx.stack().dhcp_status(fx.if_nbr).unwrap(),
        AddrCfgStatus::InProgress
    );

    // The new attempt reports its own outcome.
    send_reply(&fx, &reply(&fx, MessageType::Offer, 100)).await;
    send_reply(&fx, &reply(&fx, MessageType::Ack, 100)).await;
    let outcomes = hook.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, AddrCfgStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn stop_releases_lease() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    bind(&fx, &hook, 3600).await;

    fx.stack().dhcp_stop(fx.if_nbr).unwrap();
    let msgs = take_dhcp(&fx);
    assert_eq!(msgs.len(), 1);
    let (record, release) = &msgs[0];
    assert_eq!(record.dst, SERVER);
    assert_eq!(release.msg_type, MessageType::Release);
    assert_eq!(release.ciaddr, ADDR);
    assert_eq!(release.options.server_id, Some(SERVER));

    let stack = fx.stack();
    assert!(!stack.is_cfgd(&ADDR));
    assert_eq!(stack.dhcp_status(fx.if_nbr).unwrap(), AddrCfgStatus::None);
}

#[tokio::test(start_paused = true)]
async fn link_local_fallback() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    let cfg = DhcpCfg {
        retry_max: 1,
        timeout: 1,
        link_local_fallback: true,
        ..no_validation()
    };
    fx.stack().dhcp_start(fx.if_nbr, cfg, hook.hook()).unwrap();

    // Discover at 0s, retry at 1s, give up at 3s.
    advance(Duration::from_millis(3500)).await;
    assert_eq!(take_msg_types(&fx).len(), 2);
    assert_eq!(session_state(&fx), DhcpState::LinkLocal);
    assert!(fx.stack().autoip_state(fx.if_nbr).unwrap().is_some());
    assert!(hook.take().is_empty());

    // Three probes, then the claim.
    advance(Duration::from_secs(3)).await;
    let outcomes = hook.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, AddrCfgStatus::LinkLocal);
    let Some(IpAddr::V4(addr)) = outcomes[0].addr else {
        panic!("missing link-local address");
    };
    assert_eq!(addr.octets()[..2], [169, 254]);
    assert_eq!(
        fx.stack().dhcp_status(fx.if_nbr).unwrap(),
        AddrCfgStatus::LinkLocal
    );

    // Stopping the session also drops the link-local address.
    fx.stack().dhcp_stop(fx.if_nbr).unwrap();
    assert!(!fx.stack().is_cfgd(&addr));
    assert_eq!(fx.stack().autoip_state(fx.if_nbr).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn start_errors() {
    let fx = Fixture::new();
    let mut stack = fx.stack();

    let cfg = DhcpCfg {
        retry_max: 0,
        ..Default::default()
    };
    let result = stack.dhcp_start(fx.if_nbr, cfg, None);
    assert!(matches!(result, Err(Error::InvalidConfig(_, 0))));

    let result = stack.dhcp_stop(fx.if_nbr);
    assert!(matches!(result, Err(Error::InvalidState(_, _))));

    stack.dhcp_start(fx.if_nbr, DhcpCfg::default(), None).unwrap();
    let result = stack.dhcp_start(fx.if_nbr, DhcpCfg::default(), None);
    assert!(matches!(result, Err(Error::InvalidState(_, _))));

    stack.dhcp_stop(fx.if_nbr).unwrap();
    stack.if_stop(fx.if_nbr).unwrap();
    let result = stack.dhcp_start(fx.if_nbr, DhcpCfg::default(), None);
    assert!(matches!(result, Err(Error::InvalidState(_, _))));
}

#[tokio::test(start_paused = true)]
async fn start_tx_failure_keeps_addresses() {
    let fx = Fixture::new();
    let mut stack = fx.stack();
    stack.ipv4_add(fx.if_nbr, ip4!("192.168.1.10"), MASK, None).unwrap();

    fx.dev.set_fail_tx(true);
    let result = stack.dhcp_start(fx.if_nbr, DhcpCfg::default(), None);
    assert!(matches!(result, Err(Error::IoError(_))));

    // The failed start leaves the static configuration alone.
    assert!(stack.is_cfgd(&ip4!("192.168.1.10")));
    let iface = stack.interface(fx.if_nbr).unwrap();
    assert_eq!(iface.ipv4.cfg_mode(), AddrCfgMode::Static);
    assert!(iface.dhcp.is_none());
    assert_eq!(stack.dhcp_status(fx.if_nbr).unwrap(), AddrCfgStatus::None);

    // Once the link recovers the session takes over.
    fx.dev.set_fail_tx(false);
    stack.dhcp_start(fx.if_nbr, DhcpCfg::default(), None).unwrap();
    assert!(!stack.is_cfgd(&ip4!("192.168.1.10")));
    let iface = stack.interface(fx.if_nbr).unwrap();
    assert_eq!(iface.ipv4.cfg_mode(), AddrCfgMode::DynamicInit);
}
