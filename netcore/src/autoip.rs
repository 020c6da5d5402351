//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//
//
// IPv4 link-local address configuration (RFC 3927).
//

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use netcore_utils::task::TimeoutTask;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::arp::{self, ArpPacket};
use crate::config::AutoIpCfg;
use crate::debug::Debug;
use crate::error::Error;
use crate::hook::{AddrCfgHook, AddrCfgOutcome, AddrCfgStatus, HookSlot};
use crate::interface::Interface;
use crate::ipv4::{AddrCfgMode, Ipv4AddrObj};
use crate::stack::ProtocolInputChannelsTx;
use crate::tasks;

// Candidates are picked from 169.254.1.0 through 169.254.254.255.
const LINK_LOCAL_FIRST: u32 = 0xa9fe_0100;
const LINK_LOCAL_COUNT: u32 = 0xfe00;
const LINK_LOCAL_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 0, 0);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AutoIpState {
    Probing,
    Announcing,
    Claimed,
    Failed,
}

#[derive(Debug)]
pub struct AutoIpSession {
    pub cfg: AutoIpCfg,
    pub state: AutoIpState,
    pub status: AddrCfgStatus,
    pub candidate: Ipv4Addr,
    // Probes or announcements sent in the current state.
    pub sent: u8,
    pub conflicts: u8,
    // Started by DHCP after it gave up on finding a server.
    pub dhcp_fallback: bool,
    rng: StdRng,
    timer: Option<TimeoutTask>,
    timer_gen: u64,
    hook: HookSlot,
}

// ===== impl AutoIpSession =====

impl AutoIpSession {
    fn new(
        cfg: AutoIpCfg,
        hook: HookSlot,
        dhcp_fallback: bool,
        seed: u64,
    ) -> AutoIpSession {
        let mut rng = StdRng::seed_from_u64(seed);
        let candidate = random_candidate(&mut rng);
        AutoIpSession {
            cfg,
            state: AutoIpState::Probing,
            status: AddrCfgStatus::InProgress,
            candidate,
            sent: 0,
            conflicts: 0,
            dhcp_fallback,
            rng,
            timer: None,
            timer_gen: 0,
            hook,
        }
    }

    fn start_timer(
        &mut self,
        iface: &mut Interface,
        secs: u16,
        tx: &ProtocolInputChannelsTx,
    ) {
        self.timer_gen = iface.next_timer_gen();
        self.timer = Some(tasks::autoip_timeout(
            iface.nbr(),
            self.timer_gen,
            Duration::from_secs(secs.into()),
            &tx.autoip_timeout,
        ));
    }

    fn probe(&mut self, iface: &mut Interface, tx: &ProtocolInputChannelsTx) {
        Debug::AutoIpProbe(iface.nbr(), &self.candidate).log();
        let probe = ArpPacket::probe(iface.link.mac, self.candidate);
        if let Err(error) = arp::send(&mut iface.link, &probe) {
            error.log();
        }
        self.sent += 1;
        self.start_timer(iface, self.cfg.probe_interval, tx);
    }

    fn announce(&mut self, iface: &mut Interface) {
        let announce = ArpPacket::announce(iface.link.mac, self.candidate);
        if let Err(error) = arp::send(&mut iface.link, &announce) {
            error.log();
        }
    }

    fn complete(&mut self, outcome: AddrCfgOutcome) -> AddrCfgOutcome {
        self.status = outcome.status;
        self.hook.fire(outcome.clone());
        outcome
    }

    fn fail(
        &mut self,
        iface: &mut Interface,
        status: AddrCfgStatus,
    ) -> AddrCfgOutcome {
        self.timer = None;
        self.state = AutoIpState::Failed;
        let outcome = AddrCfgOutcome::new(iface.nbr(), status);
        self.complete(outcome)
    }

    // Gives up on an internal error.
    fn fault(&mut self, iface: &mut Interface, error: Error) -> AddrCfgOutcome {
        error.log();
        self.timer = None;
        self.state = AutoIpState::Failed;
        let outcome =
            AddrCfgOutcome::new(iface.nbr(), AddrCfgStatus::FailErrFault)
                .with_error(error.kind());
        self.complete(outcome)
    }

    // Takes the candidate once probing went unanswered.
    fn claim(
        &mut self,
        iface: &mut Interface,
        tx: &ProtocolInputChannelsTx,
    ) -> AddrCfgOutcome {
        let obj = Ipv4AddrObj::new(
            self.candidate,
            LINK_LOCAL_MASK,
            None,
            AddrCfgMode::AutoCfg,
        )
        .and_then(|obj| iface.ipv4.add(obj));
        if let Err(error) = obj {
            return self.fault(iface, error);
        }

        Debug::AutoIpClaim(iface.nbr(), &self.candidate).log();
        self.announce(iface);
        self.sent = 1;
        if self.sent < self.cfg.announce_num {
            self.state = AutoIpState::Announcing;
            self.start_timer(iface, self.cfg.announce_interval, tx);
        } else {
            self.state = AutoIpState::Claimed;
            self.timer = None;
        }

        let outcome =
            AddrCfgOutcome::new(iface.nbr(), AddrCfgStatus::LinkLocal)
                .with_addr(self.candidate, Some(LINK_LOCAL_MASK), None);
        self.complete(outcome)
    }

    fn process_timeout(
        &mut self,
        iface: &mut Interface,
        tx: &ProtocolInputChannelsTx,
    ) -> Option<AddrCfgOutcome> {
        match self.state {
            AutoIpState::Probing if self.sent < self.cfg.probe_num => {
                self.probe(iface, tx);
                None
            }
            AutoIpState::Probing => Some(self.claim(iface, tx)),
            AutoIpState::Announcing => {
                self.announce(iface);
                self.sent += 1;
                if self.sent < self.cfg.announce_num {
                    self.start_timer(iface, self.cfg.announce_interval, tx);
                } else {
                    self.state = AutoIpState::Claimed;
                }
                None
            }
            AutoIpState::Claimed | AutoIpState::Failed => None,
        }
    }

    fn process_arp(
        &mut self,
        iface: &mut Interface,
        tx: &ProtocolInputChannelsTx,
        arp: &ArpPacket,
    ) -> Option<AddrCfgOutcome> {
        if !arp.conflicts_with(&self.candidate, &iface.link.mac) {
            return None;
        }

        match self.state {
            AutoIpState::Probing => {
                self.conflicts += 1;
                Debug::AutoIpConflict(
                    iface.nbr(),
                    &self.candidate,
                    self.conflicts,
                )
                .log();
                if self.conflicts >= self.cfg.max_conflicts {
                    return Some(self.fail(iface, AddrCfgStatus::FailAddrUsed));
                }
                self.candidate = random_candidate(&mut self.rng);
                self.sent = 0;
                self.probe(iface, tx);
                None
            }
            AutoIpState::Announcing | AutoIpState::Claimed => {
                // Defend the address with a single announcement (RFC 3927,
                // section 2.5).
                if !arp.is_probe() {
                    Debug::AutoIpConflict(
                        iface.nbr(),
                        &self.candidate,
                        self.conflicts,
                    )
                    .log();
                    self.announce(iface);
                }
                None
            }
            AutoIpState::Failed => None,
        }
    }
}

// ===== global functions =====

pub(crate) fn start(
    iface: &mut Interface,
    cfg: &AutoIpCfg,
    hook: Option<Arc<dyn AddrCfgHook>>,
    dhcp_fallback: bool,
    tx: &ProtocolInputChannelsTx,
) -> Result<(), Error> {
    if !iface.up {
        return Err(Error::InvalidState(iface.nbr(), "interface down"));
    }
    if iface.autoip.as_ref().is_some_and(|session| {
        matches!(
            session.state,
            AutoIpState::Probing | AutoIpState::Announcing
        )
    }) {
        return Err(Error::InvalidState(iface.nbr(), "link-local in progress"));
    }
    if let Some(session) = iface.autoip.take() {
        if session.state != AutoIpState::Failed {
            iface.ipv4.remove_mode(AddrCfgMode::AutoCfg);
        }
    }

    // Seeding from the hardware address spreads the candidates of
    // different hosts while keeping each host's sequence repeatable.
    let seed = iface
        .link
        .mac
        .as_bytes()
        .iter()
        .fold(0u64, |seed, byte| (seed << 8) | *byte as u64);
    let hook = HookSlot::new(hook);
    let mut session =
        AutoIpSession::new(cfg.clone(), hook, dhcp_fallback, seed);
    session.probe(iface, tx);
    iface.autoip = Some(session);

    Ok(())
}

// Stops link-local configuration, dropping a claimed address. The hook is
// not invoked.
pub(crate) fn stop(iface: &mut Interface) -> Result<(), Error> {
    let Some(session) = iface.autoip.take() else {
        return Err(Error::InvalidState(iface.nbr(), "link-local not started"));
    };
    if matches!(
        session.state,
        AutoIpState::Announcing | AutoIpState::Claimed
    ) {
        iface.ipv4.remove_mode(AddrCfgMode::AutoCfg);
    }
    Ok(())
}

// Returns the outcome when the attempt completes.
pub(crate) fn process_timeout(
    iface: &mut Interface,
    tx: &ProtocolInputChannelsTx,
    timer_gen: u64,
) -> Option<(AddrCfgOutcome, bool)> {
    let mut session = iface.autoip.take()?;
    let mut outcome = None;
    if session.timer_gen == timer_gen && session.timer.is_some() {
        session.timer = None;
        outcome = session
            .process_timeout(iface, tx)
            .map(|outcome| (outcome, session.dhcp_fallback));
    }
    iface.autoip = Some(session);
    outcome
}

pub(crate) fn process_arp(
    iface: &mut Interface,
    tx: &ProtocolInputChannelsTx,
    arp: &ArpPacket,
) -> Option<(AddrCfgOutcome, bool)> {
    let mut session = iface.autoip.take()?;
    let outcome = session
        .process_arp(iface, tx, arp)
        .map(|outcome| (outcome, session.dhcp_fallback));
    iface.autoip = Some(session);
    outcome
}

// ===== helper functions =====

fn random_candidate(rng: &mut StdRng) -> Ipv4Addr {
    Ipv4Addr::from(LINK_LOCAL_FIRST + rng.random_range(0..LINK_LOCAL_COUNT))
}
