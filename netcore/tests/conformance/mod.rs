//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

mod arp;
mod autoip;
mod dhcp;
mod icmp;
mod ipv4;

use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use netcore::Stack;
use netcore::config::Config;
use netcore::device::{DevKind, NetProto};
use netcore::hook::{AddrCfgHook, AddrCfgOutcome};
use netcore::interface::IfNbr;
use netcore::test::{MockDev, TxRecord, setup};
use netcore_utils::mac_addr::MacAddr;
use netcore_utils::task::Task;

// Hardware address of the interface under test.
pub const MAC1: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
// Hardware address of a peer on the same link.
pub const MAC2: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

// Running stack with one started interface.
pub struct Fixture {
    pub stack: Arc<Mutex<Stack>>,
    pub dev: MockDev,
    pub if_nbr: IfNbr,
    _task: Task<()>,
}

// Completion hook that records every outcome it is given.
#[derive(Clone, Default)]
pub struct HookRecorder {
    outcomes: Arc<Mutex<Vec<AddrCfgOutcome>>>,
}

// ===== impl Fixture =====

impl Fixture {
    pub fn new() -> Fixture {
        Fixture::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Fixture {
        setup();

        let (stack, task) = Stack::spawn(config).unwrap();
        let dev = MockDev::new();
        let if_nbr = {
            let mut stack = stack.lock().unwrap();
            let if_nbr = stack
                .if_add(
                    "eth0",
                    DevKind::Ether,
                    MacAddr::from(MAC1),
                    Box::new(dev.clone()),
                )
                .unwrap();
            stack.if_start(if_nbr).unwrap();
            if_nbr
        };

        Fixture {
            stack,
            dev,
            if_nbr,
            _task: task,
        }
    }

    pub fn stack(&self) -> MutexGuard<'_, Stack> {
        self.stack.lock().unwrap()
    }

    // Adds and starts another interface.
    pub fn add_interface(&self, name: &str, mac: [u8; 6]) -> (IfNbr, MockDev) {
        let dev = MockDev::new();
        let mut stack = self.stack();
        let if_nbr = stack
            .if_add(
                name,
                DevKind::Ether,
                MacAddr::from(mac),
                Box::new(dev.clone()),
            )
            .unwrap();
        stack.if_start(if_nbr).unwrap();
        (if_nbr, dev)
    }

    // Posts a received packet and lets the stack worker process it.
    pub async fn inject(
        &self,
        proto: NetProto,
        src: impl Into<IpAddr>,
        dst: impl Into<IpAddr>,
        src_mac: Option<[u8; 6]>,
        data: &[u8],
    ) {
        self.dev
            .inject(
                proto,
                src.into(),
                dst.into(),
                src_mac.map(MacAddr::from),
                data,
            )
            .unwrap();
        settle().await;
    }

    pub fn take_sent(&self, proto: NetProto) -> Vec<TxRecord> {
        self.dev.take_sent_proto(proto)
    }
}

// ===== impl HookRecorder =====

impl HookRecorder {
    pub fn hook(&self) -> Option<Arc<dyn AddrCfgHook>> {
        let outcomes = self.outcomes.clone();
        Some(Arc::new(move |outcome: &AddrCfgOutcome| {
            outcomes.lock().unwrap().push(outcome.clone());
        }))
    }

    pub fn take(&self) -> Vec<AddrCfgOutcome> {
        std::mem::take(&mut self.outcomes.lock().unwrap())
    }
}

// ===== global functions =====

// Lets time pass, processing every timer that expires meanwhile.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

// Gives the stack worker a chance to drain its input queues.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
