//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//
//
// DHCPv4 client (RFC 2131).
//
// One session per interface. The session owns the interface configuration
// mode while it runs: DynamicInit until an address is bound, Dynamic
// afterwards. Completion is reported once per attempt through the session
// hook; lease expiry starts a new attempt.
//

pub mod packet;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use netcore_utils::ip::Ipv4AddrExt;
use netcore_utils::mac_addr::MacAddr;
use netcore_utils::task::TimeoutTask;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::arp::{self, ArpPacket};
use crate::autoip;
use crate::config::{Config, DhcpCfg};
use crate::debug::Debug;
use crate::device::NetProto;
use crate::dhcp::packet::{DhcpPacket, MessageType, OptionCode};
use crate::error::Error;
use crate::hook::{AddrCfgHook, AddrCfgOutcome, AddrCfgStatus, HookSlot};
use crate::interface::Interface;
use crate::ipv4::{AddrCfgMode, Ipv4AddrObj};
use crate::stack::ProtocolInputChannelsTx;
use crate::tasks;

// Parameters requested from the server.
const PARAM_REQ_LIST: [OptionCode; 5] = [
    OptionCode::SubnetMask,
    OptionCode::Router,
    OptionCode::LeaseTime,
    OptionCode::RenewalTime,
    OptionCode::RebindingTime,
];

// Lease time meaning "infinite" (RFC 2131, section 3.3).
const LEASE_INFINITE: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DhcpState {
    Selecting,
    Requesting,
    Validating,
    Bound,
    Renewing,
    // Waiting for the IPv4 link-local fallback to finish.
    LinkLocal,
    Stopped,
}

// Address lease, as offered or granted by a server.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DhcpLease {
    pub addr: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
    pub server_id: Ipv4Addr,
    // Seconds.
    pub lease_time: u32,
    pub renewal_time: u32,
    pub obtained: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DhcpSession {
    pub cfg: DhcpCfg,
    pub state: DhcpState,
    pub status: AddrCfgStatus,
    pub xid: u32,
    pub retries: u8,
    pub offer: Option<DhcpLease>,
    pub lease: Option<DhcpLease>,
    timeout: Duration,
    timer: Option<TimeoutTask>,
    timer_gen: u64,
    hook: HookSlot,
}

// ===== impl DhcpLease =====

impl DhcpLease {
    fn from_packet(
        pkt: &DhcpPacket,
        server_id: Option<Ipv4Addr>,
    ) -> Option<Self> {
        let server_id = pkt.options.server_id.or(server_id)?;
        let mask = pkt
            .options
            .subnet_mask
            .unwrap_or_else(|| classful_mask(&pkt.yiaddr));
        let lease_time = pkt.options.lease_time.unwrap_or(LEASE_INFINITE);
        let renewal_time = pkt.options.renewal_time.unwrap_or(lease_time / 2);

        Some(DhcpLease {
            addr: pkt.yiaddr,
            mask,
            gateway: pkt.options.router,
            server_id,
            lease_time,
            renewal_time,
            obtained: Utc::now(),
        })
    }

    // Builds the address object, dropping a gateway outside the subnet.
    fn addr_obj(&self) -> Result<Ipv4AddrObj, Error> {
        let mode = AddrCfgMode::Dynamic;
        match Ipv4AddrObj::new(self.addr, self.mask, self.gateway, mode) {
            Err(Error::InvalidGateway(_)) => {
                Ipv4AddrObj::new(self.addr, self.mask, None, mode)
            }
            result => result,
        }
    }
}

// ===== impl DhcpSession =====

impl DhcpSession {
    fn new(cfg: DhcpCfg, hook: HookSlot) -> DhcpSession {
        let timeout = Duration::from_secs(cfg.timeout.into());
        DhcpSession {
            cfg,
            state: DhcpState::Selecting,
            status: AddrCfgStatus::InProgress,
            xid: 0,
            retries: 0,
            offer: None,
            lease: None,
            timeout,
            timer: None,
            timer_gen: 0,
            hook,
        }
    }

    pub fn timer_remaining(&self) -> Option<Duration> {
        self.timer.as_ref().map(|timer| timer.remaining())
    }

    fn set_state(&mut self, iface: &Interface, state: DhcpState) {
        if self.state != state {
            Debug::DhcpStateChange(iface.nbr(), &self.state, &state).log();
            self.state = state;
        }
    }

    fn start_timer(
        &mut self,
        iface: &mut Interface,
        timeout: Duration,
        tx: &ProtocolInputChannelsTx,
    ) {
        self.timer_gen = iface.next_timer_gen();
        self.timer = Some(tasks::dhcp_timeout(
            iface.nbr(),
            self.timer_gen,
            timeout,
            &tx.dhcp_timeout,
        ));
    }

    fn send(
        &self,
        iface: &mut Interface,
        msg_type: MessageType,
    ) -> Result<(), Error> {
        let mut pkt = DhcpPacket::client(msg_type, self.xid, iface.link.mac);
        let mut src = Ipv4Addr::UNSPECIFIED;
        let mut dst = Ipv4Addr::BROADCAST;

        match msg_type {
            MessageType::Discover => {
                pkt.broadcast = true;
                pkt.options.param_req_list = Some(param_req_list());
            }
            MessageType::Request if self.state == DhcpState::Renewing => {
                let Some(lease) = &self.lease else {
                    return Err(Error::Fault("DHCP renewal without lease"));
                };
                pkt.ciaddr = lease.addr;
                pkt.options.param_req_list = Some(param_req_list());
                src = lease.addr;
                dst = lease.server_id;
            }
            MessageType::Request | MessageType::Decline => {
                let Some(offer) = &self.offer else {
                    return Err(Error::Fault("DHCP request without offer"));
                };
                pkt.broadcast = true;
                pkt.options.requested_addr = Some(offer.addr);
                pkt.options.server_id = Some(offer.server_id);
                if msg_type == MessageType::Request {
                    pkt.options.param_req_list = Some(param_req_list());
                }
            }
            MessageType::Release => {
                let Some(lease) = &self.lease else {
                    return Err(Error::Fault("DHCP release without lease"));
                };
                pkt.ciaddr = lease.addr;
                pkt.options.server_id = Some(lease.server_id);
                src = lease.addr;
                dst = lease.server_id;
            }
            _ => return Err(Error::Fault("unexpected DHCP client message")),
        }

        Debug::DhcpMsgTx(iface.nbr(), &msg_type).log();
        let dst_mac = dst.is_broadcast().then_some(MacAddr::BROADCAST);
        iface.link.send(
            NetProto::Udp {
                src_port: self.cfg.client_port,
                dst_port: self.cfg.server_port,
            },
            IpAddr::V4(src),
            IpAddr::V4(dst),
            dst_mac,
            &pkt.encode(),
        )
    }

    // Starts a new attempt from the Selecting state.
    fn discover(
        &mut self,
        iface: &mut Interface,
        tx: &ProtocolInputChannelsTx,
    ) -> Result<(), Error> {
        self.xid = rand::rng().random();
        self.retries = 0;
        self.timeout = Duration::from_secs(self.cfg.timeout.into());
        self.offer = None;
        self.set_state(iface, DhcpState::Selecting);
        self.send(iface, MessageType::Discover)?;
        self.start_timer(iface, self.timeout, tx);
        Ok(())
    }

    fn complete(&mut self, outcome: AddrCfgOutcome) {
        self.status = outcome.status;
        self.hook.fire(outcome);
    }

    // Ends the attempt with a failure status.
    fn fail(&mut self, iface: &mut Interface, status: AddrCfgStatus) {
        let outcome = AddrCfgOutcome::new(iface.nbr(), status);
        self.abort(iface, outcome);
    }

    // Ends the attempt on an internal error.
    fn fault(&mut self, iface: &mut Interface, error: Error) {
        error.log();
        let outcome =
            AddrCfgOutcome::new(iface.nbr(), AddrCfgStatus::FailErrFault)
                .with_error(error.kind());
        self.abort(iface, outcome);
    }

    fn abort(&mut self, iface: &mut Interface, outcome: AddrCfgOutcome) {
        self.timer = None;
        self.offer = None;
        self.lease = None;
        self.set_state(iface, DhcpState::Stopped);
        iface.ipv4.remove_mode(AddrCfgMode::Dynamic);
        iface.ipv4.set_cfg_mode(AddrCfgMode::None);
        self.complete(outcome);
    }

    // Lease lost: drop the address and start over.
    fn restart(
        &mut self,
        iface: &mut Interface,
        tx: &ProtocolInputChannelsTx,
    ) {
        self.lease = None;
        iface.ipv4.remove_mode(AddrCfgMode::Dynamic);
        iface.ipv4.set_cfg_mode(AddrCfgMode::DynamicInit);
        self.status = AddrCfgStatus::InProgress;
        self.hook.rearm();
        if let Err(error) = self.discover(iface, tx) {
            self.fault(iface, error);
        }
    }

    fn process_timeout(
        &mut self,
        iface: &mut Interface,
        config: &Config,
        tx: &ProtocolInputChannelsTx,
    ) {
        match self.state {
            DhcpState::Selecting | DhcpState::Requesting => {
                if self.retries < self.cfg.retry_max {
                    self.retries += 1;
                    self.timeout *= 2;
                    let msg_type = match self.state {
                        DhcpState::Selecting => MessageType::Discover,
                        _ => MessageType::Request,
                    };
                    if let Err(error) = self.send(iface, msg_type) {
                        error.log();
                    }
                    self.start_timer(iface, self.timeout, tx);
                } else if self.state == DhcpState::Selecting
                    && self.cfg.link_local_fallback
                {
                    self.set_state(iface, DhcpState::LinkLocal);
                    if let Err(error) =
                        autoip::start(iface, &config.autoip, None, true, tx)
                    {
                        self.fault(iface, error);
                    }
                } else {
                    self.fail(iface, AddrCfgStatus::FailNoServer);
                }
            }
            DhcpState::Validating => {
                // Nobody claimed the offered address.
                self.bind(iface, tx);
            }
            DhcpState::Bound => {
                self.set_state(iface, DhcpState::Renewing);
                if let Err(error) = self.send(iface, MessageType::Request) {
                    error.log();
                }
                if let Some(lease) = &self.lease {
                    let remaining =
                        lease.lease_time.saturating_sub(lease.renewal_time);
                    let remaining = Duration::from_secs(remaining.into());
                    self.start_timer(iface, remaining, tx);
                }
            }
            DhcpState::Renewing => {
                // Lease expired.
                self.restart(iface, tx);
            }
            DhcpState::LinkLocal | DhcpState::Stopped => (),
        }
    }

    fn process_packet(
        &mut self,
        iface: &mut Interface,
        tx: &ProtocolInputChannelsTx,
        pkt: DhcpPacket,
    ) {
        if !pkt.reply || pkt.xid != self.xid || pkt.chaddr != iface.link.mac {
            return;
        }

        match (self.state, pkt.msg_type) {
            (DhcpState::Selecting, MessageType::Offer) => {
                let Some(offer) = DhcpLease::from_packet(&pkt, None) else {
                    return;
                };
                self.offer = Some(offer);
                self.retries = 0;
                self.timeout = Duration::from_secs(self.cfg.timeout.into());
                self.set_state(iface, DhcpState::Requesting);
                if let Err(error) = self.send(iface, MessageType::Request) {
                    error.log();
                }
                self.start_timer(iface, self.timeout, tx);
            }
            (DhcpState::Requesting, MessageType::Ack) => {
                self.process_ack(iface, tx, &pkt);
            }
            (DhcpState::Requesting, MessageType::Nak) => {
                self.fail(iface, AddrCfgStatus::FailNakRx);
            }
            (DhcpState::Renewing, MessageType::Ack) => {
                let server_id = self.lease.as_ref().map(|l| l.server_id);
                let Some(lease) = DhcpLease::from_packet(&pkt, server_id)
                else {
                    return;
                };
                match lease.addr_obj() {
                    Ok(obj) => {
                        iface.ipv4.replace_all(obj);
                        self.lease = Some(lease);
                        self.set_state(iface, DhcpState::Bound);
                        self.start_renewal_timer(iface, tx);
                    }
                    Err(error) => {
                        error.log();
                        self.restart(iface, tx);
                    }
                }
            }
            (DhcpState::Renewing, MessageType::Nak) => {
                self.restart(iface, tx);
            }
            _ => (),
        }
    }

    fn process_ack(
        &mut self,
        iface: &mut Interface,
        tx: &ProtocolInputChannelsTx,
        pkt: &DhcpPacket,
    ) {
        let server_id = self.offer.as_ref().map(|offer| offer.server_id);
        let Some(lease) = DhcpLease::from_packet(pkt, server_id) else {
            return;
        };
        self.offer = Some(lease.clone());

        if let Err(error) = lease.addr_obj() {
            error.log();
            if let Err(error) = self.send(iface, MessageType::Decline) {
                error.log();
            }
            self.fail(iface, AddrCfgStatus::FailOfferDecline);
            return;
        }

        if !self.cfg.validate_addr {
            self.bind(iface, tx);
            return;
        }

        // Probe the link for another owner of the address (RFC 2131,
        // section 4.4.1).
        self.set_state(iface, DhcpState::Validating);
        let probe = ArpPacket::probe(iface.link.mac, lease.addr);
        if let Err(error) = arp::send(&mut iface.link, &probe) {
            error.log();
        }
        let timeout = Duration::from_secs(self.cfg.validate_timeout.into());
        self.start_timer(iface, timeout, tx);
    }

    fn bind(&mut self, iface: &mut Interface, tx: &ProtocolInputChannelsTx) {
        let Some(lease) = self.offer.take() else {
            return;
        };
        let obj = match lease.addr_obj() {
            Ok(obj) => obj,
            Err(error) => {
                self.fault(iface, error);
                return;
            }
        };

        let outcome = AddrCfgOutcome::new(iface.nbr(), AddrCfgStatus::Success)
            .with_addr(obj.host, Some(obj.mask), obj.gateway);
        iface.ipv4.replace_all(obj);
        self.lease = Some(lease);
        self.set_state(iface, DhcpState::Bound);
        self.start_renewal_timer(iface, tx);
        self.complete(outcome);
    }

    fn start_renewal_timer(
        &mut self,
        iface: &mut Interface,
        tx: &ProtocolInputChannelsTx,
    ) {
        self.timer = None;
        let Some(lease) = &self.lease else {
            return;
        };
        if lease.lease_time == LEASE_INFINITE {
            return;
        }
        let t1 = Duration::from_secs(lease.renewal_time.into());
        self.start_timer(iface, t1, tx);
    }

    fn process_arp(&mut self, iface: &mut Interface, arp: &ArpPacket) {
        if self.state != DhcpState::Validating {
            return;
        }
        let Some(offer) = &self.offer else {
            return;
        };
        if !arp.conflicts_with(&offer.addr, &iface.link.mac) {
            return;
        }

        if let Err(error) = self.send(iface, MessageType::Decline) {
            error.log();
        }
        self.fail(iface, AddrCfgStatus::FailAddrUsed);
    }
}

// ===== global functions =====

pub(crate) fn start(
    iface: &mut Interface,
    cfg: DhcpCfg,
    hook: Option<Arc<dyn AddrCfgHook>>,
    tx: &ProtocolInputChannelsTx,
) -> Result<(), Error> {
    cfg.validate()?;
    if !iface.up {
        return Err(Error::InvalidState(iface.nbr(), "interface down"));
    }
    if iface
        .dhcp
        .as_ref()
        .is_some_and(|session| session.status == AddrCfgStatus::InProgress)
    {
        return Err(Error::InvalidState(iface.nbr(), "DHCP in progress"));
    }

    let mut session = DhcpSession::new(cfg, HookSlot::new(hook));
    session.discover(iface, tx)?;

    // The session takes over the interface addresses once the first
    // DISCOVER is out.
    iface.ipv4.remove_all();
    iface.ipv4.set_cfg_mode(AddrCfgMode::DynamicInit);
    iface.dhcp = Some(session);

    Ok(())
}

// Stops the session, releasing a bound lease. The hook is not invoked.
pub(crate) fn stop(iface: &mut Interface) -> Result<(), Error> {
    let Some(mut session) = iface.dhcp.take() else {
        return Err(Error::InvalidState(iface.nbr(), "DHCP not started"));
    };

    if matches!(session.state, DhcpState::Bound | DhcpState::Renewing) {
        if let Err(error) = session.send(iface, MessageType::Release) {
            error.log();
        }
    }
    if session.state == DhcpState::LinkLocal || is_fallback_active(iface) {
        let _ = autoip::stop(iface);
    }
    session.timer = None;
    session.set_state(iface, DhcpState::Stopped);
    iface.ipv4.remove_mode(AddrCfgMode::Dynamic);
    iface.ipv4.set_cfg_mode(AddrCfgMode::None);

    Ok(())
}

pub(crate) fn process_timeout(
    iface: &mut Interface,
    config: &Config,
    tx: &ProtocolInputChannelsTx,
    timer_gen: u64,
) {
    let Some(mut session) = iface.dhcp.take() else {
        return;
    };
    if session.timer_gen == timer_gen && session.timer.is_some() {
        session.timer = None;
        session.process_timeout(iface, config, tx);
    }
    iface.dhcp = Some(session);
}

pub(crate) fn process_packet(
    iface: &mut Interface,
    tx: &ProtocolInputChannelsTx,
    pkt: DhcpPacket,
) {
    let Some(mut session) = iface.dhcp.take() else {
        return;
    };
    Debug::DhcpMsgRx(iface.nbr(), &pkt).log();
    session.process_packet(iface, tx, pkt);
    iface.dhcp = Some(session);
}

pub(crate) fn process_arp(iface: &mut Interface, arp: &ArpPacket) {
    let Some(mut session) = iface.dhcp.take() else {
        return;
    };
    session.process_arp(iface, arp);
    iface.dhcp = Some(session);
}

// Reports the end of the link-local fallback as the session outcome.
pub(crate) fn fallback_complete(
    iface: &mut Interface,
    outcome: &AddrCfgOutcome,
) {
    let Some(mut session) = iface.dhcp.take() else {
        return;
    };
    if session.state == DhcpState::LinkLocal {
        match outcome.status {
            AddrCfgStatus::LinkLocal => {
                iface.ipv4.set_cfg_mode(AddrCfgMode::AutoCfg);
            }
            _ => {
                iface.ipv4.set_cfg_mode(AddrCfgMode::None);
                session.set_state(iface, DhcpState::Stopped);
            }
        }
        session.complete(outcome.clone());
    }
    iface.dhcp = Some(session);
}

// ===== helper functions =====

fn is_fallback_active(iface: &Interface) -> bool {
    iface
        .autoip
        .as_ref()
        .is_some_and(|session| session.dhcp_fallback)
}

fn param_req_list() -> Vec<u8> {
    PARAM_REQ_LIST.iter().map(|code| *code as u8).collect()
}

// Natural mask of the address class, used when the server sends none.
fn classful_mask(addr: &Ipv4Addr) -> Ipv4Addr {
    if addr.is_class_a() {
        Ipv4Addr::new(255, 0, 0, 0)
    } else if addr.is_class_b() {
        Ipv4Addr::new(255, 255, 0, 0)
    } else {
        Ipv4Addr::new(255, 255, 255, 0)
    }
}
