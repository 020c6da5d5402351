//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::time::Duration;

use const_addrs::ip4;
use netcore::arp::{ArpOp, ArpPacket};
use netcore::autoip::AutoIpState;
use netcore::config::Config;
use netcore::device::NetProto;
use netcore::error::Error;
use netcore::hook::AddrCfgStatus;
use netcore_utils::mac_addr::MacAddr;

use super::{Fixture, HookRecorder, MAC1, MAC2, advance};

fn candidate(fx: &Fixture) -> Ipv4Addr {
    let stack = fx.stack();
    let iface = stack.interface(fx.if_nbr).unwrap();
    iface.autoip.as_ref().unwrap().candidate
}

fn state(fx: &Fixture) -> Option<AutoIpState> {
    fx.stack().autoip_state(fx.if_nbr).unwrap()
}

fn take_arp(fx: &Fixture) -> Vec<ArpPacket> {
    fx.take_sent(NetProto::Arp)
        .into_iter()
        .map(|record| ArpPacket::decode(&mut record.data.clone()).unwrap())
        .collect()
}

async fn inject_arp(fx: &Fixture, pkt: ArpPacket) {
    let data = pkt.encode();
    let (src, dst) = (pkt.spa, pkt.tpa);
    fx.inject(NetProto::Arp, src, dst, Some(MAC2), &data).await;
}

// Packet from another host using `addr`.
fn foreign_reply(addr: Ipv4Addr) -> ArpPacket {
    ArpPacket {
        op: ArpOp::Reply,
        sha: MAC2.into(),
        spa: addr,
        tha: MacAddr::UNSPECIFIED,
        tpa: Ipv4Addr::UNSPECIFIED,
    }
}

async fn claimed(fx: &Fixture, hook: &HookRecorder) -> Ipv4Addr {
    fx.stack().autoip_start(fx.if_nbr, hook.hook()).unwrap();
    advance(Duration::from_secs(6)).await;
    assert_eq!(state(fx), Some(AutoIpState::Claimed));
    fx.dev.take_sent();
    candidate(fx)
}

#[tokio::test(start_paused = true)]
async fn probe_and_claim() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    fx.stack().autoip_start(fx.if_nbr, hook.hook()).unwrap();

    let addr = candidate(&fx);
    assert!(addr >= ip4!("169.254.1.0") && addr <= ip4!("169.254.254.255"));
    assert_eq!(take_arp(&fx), [ArpPacket::probe(MAC1.into(), addr)]);
    assert_eq!(state(&fx), Some(AutoIpState::Probing));

    advance(Duration::from_millis(2500)).await;
    assert_eq!(take_arp(&fx).len(), 2);
    assert!(hook.take().is_empty());
    assert!(!fx.stack().is_cfgd(&addr));

    advance(Duration::from_secs(1)).await;
    assert_eq!(take_arp(&fx), [ArpPacket::announce(MAC1.into(), addr)]);
    assert_eq!(state(&fx), Some(AutoIpState::Announcing));
    let outcomes = hook.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, AddrCfgStatus::LinkLocal);
    assert_eq!(outcomes[0].addr, Some(addr.into()));
    assert_eq!(outcomes[0].mask, Some(ip4!("255.255.0.0")));
    assert_eq!(outcomes[0].gateway, None);
    assert!(fx.stack().is_cfgd(&addr));

    advance(Duration::from_secs(2)).await;
    assert_eq!(take_arp(&fx), [ArpPacket::announce(MAC1.into(), addr)]);
    assert_eq!(state(&fx), Some(AutoIpState::Claimed));

    // Nothing more once claimed.
    advance(Duration::from_secs(10)).await;
    assert!(take_arp(&fx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn candidate_in_use() {
    let fx = Fixture::new();
    fx.stack().autoip_start(fx.if_nbr, None).unwrap();
    let first = candidate(&fx);
    take_arp(&fx);

    inject_arp(&fx, foreign_reply(first)).await;

    let second = candidate(&fx);
    assert_ne!(first, second);
    assert_eq!(take_arp(&fx), [ArpPacket::probe(MAC1.into(), second)]);
    {
        let stack = fx.stack();
        let iface = stack.interface(fx.if_nbr).unwrap();
        assert_eq!(iface.autoip.as_ref().unwrap().conflicts, 1);
    }

    // Probing starts over for the new candidate.
    advance(Duration::from_millis(2500)).await;
    assert_eq!(take_arp(&fx).len(), 2);
    advance(Duration::from_secs(1)).await;
    assert!(fx.stack().is_cfgd(&second));
    assert!(!fx.stack().is_cfgd(&first));
}

#[tokio::test(start_paused = true)]
async fn simultaneous_probe() {
    let fx = Fixture::new();
    fx.stack().autoip_start(fx.if_nbr, None).unwrap();
    let first = candidate(&fx);

    inject_arp(&fx, ArpPacket::probe(MAC2.into(), first)).await;
    assert_ne!(candidate(&fx), first);

    // Our own probe looped back is not a conflict.
    let second = candidate(&fx);
    inject_arp(&fx, ArpPacket::probe(MAC1.into(), second)).await;
    assert_eq!(candidate(&fx), second);
}

#[tokio::test(start_paused = true)]
async fn too_many_conflicts() {
    let mut config = Config::default();
    config.autoip.max_conflicts = 2;
    let fx = Fixture::with_config(config);
    let hook = HookRecorder::default();
    fx.stack().autoip_start(fx.if_nbr, hook.hook()).unwrap();

    inject_arp(&fx, foreign_reply(candidate(&fx))).await;
    assert!(hook.take().is_empty());
    inject_arp(&fx, foreign_reply(candidate(&fx))).await;

    let outcomes = hook.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, AddrCfgStatus::FailAddrUsed);
    assert_eq!(outcomes[0].addr, None);
    assert_eq!(state(&fx), Some(AutoIpState::Failed));

    // A failed attempt can be restarted.
    fx.dev.take_sent();
    fx.stack().autoip_start(fx.if_nbr, None).unwrap();
    assert_eq!(state(&fx), Some(AutoIpState::Probing));
    assert_eq!(take_arp(&fx).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn defend_claimed_address() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    let addr = claimed(&fx, &hook).await;
    hook.take();

    inject_arp(&fx, foreign_reply(addr)).await;
    assert_eq!(take_arp(&fx), [ArpPacket::announce(MAC1.into(), addr)]);
    assert!(fx.stack().is_cfgd(&addr));
    assert_eq!(state(&fx), Some(AutoIpState::Claimed));
    assert!(hook.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn answer_probe_for_claimed_address() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    let addr = claimed(&fx, &hook).await;

    inject_arp(&fx, ArpPacket::probe(MAC2.into(), addr)).await;

    let sent = take_arp(&fx);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].op, ArpOp::Reply);
    assert_eq!(sent[0].spa, addr);
    assert_eq!(sent[0].tha, MAC2.into());
    assert!(fx.stack().is_cfgd(&addr));
}

#[tokio::test(start_paused = true)]
async fn stop_removes_address() {
    let fx = Fixture::new();
    let hook = HookRecorder::default();
    let addr = claimed(&fx, &hook).await;

    fx.stack().autoip_stop(fx.if_nbr).unwrap();
    assert!(!fx.stack().is_cfgd(&addr));
    assert_eq!(state(&fx), None);
}

#[tokio::test(start_paused = true)]
async fn start_errors() {
    let fx = Fixture::new();
    let mut stack = fx.stack();

    let result = stack.autoip_stop(fx.if_nbr);
    assert!(matches!(result, Err(Error::InvalidState(_, _))));

    stack.autoip_start(fx.if_nbr, None).unwrap();
    let result = stack.autoip_start(fx.if_nbr, None);
    assert!(matches!(result, Err(Error::InvalidState(_, _))));

    stack.autoip_stop(fx.if_nbr).unwrap();
    stack.if_stop(fx.if_nbr).unwrap();
    let result = stack.autoip_start(fx.if_nbr, None);
    assert!(matches!(result, Err(Error::InvalidState(_, _))));
}
