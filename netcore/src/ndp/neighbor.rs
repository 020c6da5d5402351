//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, VecDeque};
use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

use generational_arena::{Arena, Index};
use netcore_utils::mac_addr::MacAddr;
use netcore_utils::task::TimeoutTask;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::{NdpSolicitKind, NdpTimeoutKind};
use crate::debug::Debug;
use crate::device::NetTxPacket;
use crate::error::Error;
use crate::interface::IfNbr;
use crate::ndp::packet::{NaFlags, NeighborAdvert, NeighborSolicit};
use crate::ndp::{NdpCtx, send_ns};
use crate::tasks;

// Neighbor cache entry.
#[derive(Debug)]
pub struct Neighbor {
    pub idx: Index,
    pub addr: Ipv6Addr,
    pub mac: Option<MacAddr>,
    pub state: NbrState,
    pub is_router: bool,
    pub solicit_remaining: u8,
    // Packets waiting for address resolution.
    pub tx_queue: VecDeque<NetTxPacket>,
    pub updated: Instant,
    timer: Option<TimeoutTask>,
    timer_gen: u64,
}

// Neighbor reachability states (RFC 4861, section 7.3.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum NbrState {
    Incomplete,
    Reachable,
    Stale,
    Delay,
    Probe,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NbrRemoveReason {
    SolicitExhausted,
    SolicitFailed,
    CacheTimeout,
    Evicted,
    Flushed,
}

// Bounded neighbor cache of one interface.
#[derive(Debug)]
pub struct NeighborCache {
    if_nbr: IfNbr,
    arena: Arena<Neighbor>,
    addr_tree: BTreeMap<Ipv6Addr, Index>,
    next_timer_gen: u64,
}

// ===== impl Neighbor =====

impl Neighbor {
    fn new(idx: Index, addr: Ipv6Addr) -> Neighbor {
        Neighbor {
            idx,
            addr,
            mac: None,
            state: NbrState::Incomplete,
            is_router: false,
            solicit_remaining: 0,
            tx_queue: Default::default(),
            updated: Instant::now(),
            timer: None,
            timer_gen: 0,
        }
    }

    fn set_state(&mut self, if_nbr: IfNbr, state: NbrState) {
        if self.state != state {
            Debug::NbrStateChange(if_nbr, &self.addr, &self.state, &state)
                .log();
            self.state = state;
        }
        self.updated = Instant::now();
    }

    pub fn timer_remaining(&self) -> Option<Duration> {
        self.timer.as_ref().map(|timer| timer.remaining())
    }
}

// ===== impl NeighborCache =====

impl NeighborCache {
    pub(crate) fn new(if_nbr: IfNbr) -> NeighborCache {
        NeighborCache {
            if_nbr,
            arena: Default::default(),
            addr_tree: Default::default(),
            next_timer_gen: 0,
        }
    }

    pub fn get(&self, addr: &Ipv6Addr) -> Option<&Neighbor> {
        self.addr_tree
            .get(addr)
            .and_then(|idx| self.arena.get(*idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> + '_ {
        self.addr_tree.values().map(|idx| &self.arena[*idx])
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Transmits `packet`, resolving its IPv6 destination first.
    ///
    /// Packets to unresolved neighbors are queued until the neighbor
    /// answers. On error the packet is dropped and its buffer released.
    pub(crate) fn resolve_and_send(
        &mut self,
        ctx: &mut NdpCtx<'_>,
        mut packet: NetTxPacket,
    ) -> Result<(), Error> {
        let IpAddr::V6(dst) = packet.dst else {
            return Err(Error::Fault("IPv4 packet handed to neighbor cache"));
        };

        if dst.is_multicast() {
            packet.dst_mac = Some(MacAddr::from_ipv6_mcast(&dst));
            return ctx.link.transmit(packet);
        }

        let Some(idx) = self.addr_tree.get(&dst).copied() else {
            // Start address resolution.
            if self.arena.len() >= ctx.cfg.cache_max as usize {
                self.evict_oldest_stale()?;
            }
            let idx = self.insert(dst);
            self.arena[idx].solicit_remaining =
                ctx.cfg.solicit_max(NdpSolicitKind::Multicast);
            if let Err(error) =
                self.solicit(ctx, idx, NdpSolicitKind::Multicast)
            {
                error.log();
                self.remove(idx, NbrRemoveReason::SolicitFailed);
                return Err(Error::NbrSolicitFailed(self.if_nbr, dst));
            }
            self.arena[idx].tx_queue.push_back(packet);
            return Ok(());
        };

        let nbr = &mut self.arena[idx];
        match nbr.state {
            NbrState::Incomplete => {
                if nbr.tx_queue.len() >= ctx.cfg.tx_q_max_th as usize {
                    return Err(Error::NbrTxQueueFull(self.if_nbr, dst));
                }
                nbr.tx_queue.push_back(packet);
                Ok(())
            }
            NbrState::Reachable | NbrState::Delay | NbrState::Probe => {
                packet.dst_mac = nbr.mac;
                ctx.link.transmit(packet)
            }
            NbrState::Stale => {
                packet.dst_mac = nbr.mac;
                nbr.set_state(self.if_nbr, NbrState::Delay);
                let timeout = ctx.cfg.timeout(NdpTimeoutKind::Delay);
                self.start_timer(ctx, idx, timeout);
                ctx.link.transmit(packet)
            }
        }
    }

    pub(crate) fn process_timeout(
        &mut self,
        ctx: &mut NdpCtx<'_>,
        idx: Index,
        timer_gen: u64,
    ) {
        let Some(nbr) = self.arena.get_mut(idx) else {
            return;
        };
        if nbr.timer_gen != timer_gen {
            return;
        }
        nbr.timer = None;

        match nbr.state {
            NbrState::Incomplete | NbrState::Probe => {
                let kind = match nbr.state {
                    NbrState::Incomplete => NdpSolicitKind::Multicast,
                    _ => NdpSolicitKind::Unicast,
                };
                if nbr.solicit_remaining == 0 {
                    self.remove(idx, NbrRemoveReason::SolicitExhausted);
                    return;
                }
                if let Err(error) = self.solicit(ctx, idx, kind) {
                    error.log();
                    self.remove(idx, NbrRemoveReason::SolicitFailed);
                }
            }
            NbrState::Reachable => {
                nbr.set_state(self.if_nbr, NbrState::Stale);
                let timeout = ctx.cfg.cache_timeout();
                self.start_timer(ctx, idx, timeout);
            }
            NbrState::Stale => {
                self.remove(idx, NbrRemoveReason::CacheTimeout);
            }
            NbrState::Delay => {
                nbr.set_state(self.if_nbr, NbrState::Probe);
                nbr.solicit_remaining =
                    ctx.cfg.solicit_max(NdpSolicitKind::Unicast);
                if let Err(error) =
                    self.solicit(ctx, idx, NdpSolicitKind::Unicast)
                {
                    error.log();
                    self.remove(idx, NbrRemoveReason::SolicitFailed);
                }
            }
        }
    }

    // Neighbor Advertisement processing (RFC 4861, section 7.2.5).
    pub(crate) fn process_na(
        &mut self,
        ctx: &mut NdpCtx<'_>,
        na: &NeighborAdvert,
    ) {
        let if_nbr = self.if_nbr;
        let Some(idx) = self.addr_tree.get(&na.target).copied() else {
            return;
        };
        let nbr = &mut self.arena[idx];
        let solicited = na.flags.contains(NaFlags::SOLICITED);

        let timeout = if nbr.state == NbrState::Incomplete {
            let Some(mac) = na.tgt_lladdr else {
                return;
            };
            nbr.mac = Some(mac);
            nbr.is_router = na.flags.contains(NaFlags::ROUTER);
            if solicited {
                nbr.set_state(if_nbr, NbrState::Reachable);
                ctx.cfg.timeout(NdpTimeoutKind::Reachable)
            } else {
                nbr.set_state(if_nbr, NbrState::Stale);
                ctx.cfg.cache_timeout()
            }
        } else {
            let mac_differs =
                na.tgt_lladdr.is_some_and(|mac| nbr.mac != Some(mac));
            if mac_differs && !na.flags.contains(NaFlags::OVERRIDE) {
                if nbr.state != NbrState::Reachable {
                    return;
                }
                nbr.set_state(if_nbr, NbrState::Stale);
                ctx.cfg.cache_timeout()
            } else {
                if let Some(mac) = na.tgt_lladdr {
                    nbr.mac = Some(mac);
                }
                nbr.is_router = na.flags.contains(NaFlags::ROUTER);
                if solicited {
                    nbr.set_state(if_nbr, NbrState::Reachable);
                    ctx.cfg.timeout(NdpTimeoutKind::Reachable)
                } else if mac_differs {
                    nbr.set_state(if_nbr, NbrState::Stale);
                    ctx.cfg.cache_timeout()
                } else {
                    return;
                }
            }
        };

        self.start_timer(ctx, idx, timeout);
        self.flush_queue(ctx, idx);
    }

    // Records the link-layer address carried by a Neighbor Solicitation
    // (RFC 4861, section 7.2.3).
    pub(crate) fn process_ns(
        &mut self,
        ctx: &mut NdpCtx<'_>,
        src: Ipv6Addr,
        ns: &NeighborSolicit,
    ) {
        let Some(mac) = ns.src_lladdr else {
            return;
        };

        let idx = match self.addr_tree.get(&src).copied() {
            Some(idx) => {
                let nbr = &mut self.arena[idx];
                if nbr.mac == Some(mac) {
                    return;
                }
                idx
            }
            None => {
                if self.arena.len() >= ctx.cfg.cache_max as usize
                    && self.evict_oldest_stale().is_err()
                {
                    return;
                }
                self.insert(src)
            }
        };

        let nbr = &mut self.arena[idx];
        nbr.mac = Some(mac);
        nbr.set_state(self.if_nbr, NbrState::Stale);
        let timeout = ctx.cfg.cache_timeout();
        self.start_timer(ctx, idx, timeout);
        self.flush_queue(ctx, idx);
    }

    pub(crate) fn clear(&mut self) {
        let idxs = self.arena.iter().map(|(idx, _)| idx).collect::<Vec<_>>();
        for idx in idxs {
            self.remove(idx, NbrRemoveReason::Flushed);
        }
    }

    fn insert(&mut self, addr: Ipv6Addr) -> Index {
        let idx = self.arena.insert_with(|idx| Neighbor::new(idx, addr));
        self.addr_tree.insert(addr, idx);
        Debug::NbrCreate(self.if_nbr, &addr).log();
        idx
    }

    fn remove(&mut self, idx: Index, reason: NbrRemoveReason) {
        let Some(nbr) = self.arena.remove(idx) else {
            return;
        };
        self.addr_tree.remove(&nbr.addr);
        Debug::NbrRemove(self.if_nbr, &nbr.addr, reason).log();
    }

    // Makes room by dropping the least recently updated STALE entry.
    fn evict_oldest_stale(&mut self) -> Result<(), Error> {
        let Some(idx) = self
            .arena
            .iter()
            .filter(|(_, nbr)| nbr.state == NbrState::Stale)
            .min_by_key(|(_, nbr)| nbr.updated)
            .map(|(idx, _)| idx)
        else {
            return Err(Error::NbrCacheFull(self.if_nbr));
        };
        self.remove(idx, NbrRemoveReason::Evicted);
        Ok(())
    }

    fn solicit(
        &mut self,
        ctx: &mut NdpCtx<'_>,
        idx: Index,
        kind: NdpSolicitKind,
    ) -> Result<(), Error> {
        let nbr = &mut self.arena[idx];
        let Some(src) = ctx.src else {
            return Err(Error::NoSourceAddr(nbr.addr.into()));
        };
        let unicast_mac = match kind {
            NdpSolicitKind::Unicast => nbr.mac,
            _ => None,
        };

        send_ns(ctx.link, src, nbr.addr, unicast_mac)?;
        Debug::NbrSolicitTx(self.if_nbr, &nbr.addr, kind).log();
        nbr.solicit_remaining = nbr.solicit_remaining.saturating_sub(1);

        let timeout = ctx.cfg.timeout(NdpTimeoutKind::Solicit);
        self.start_timer(ctx, idx, timeout);
        Ok(())
    }

    // Sends the packets queued while the neighbor was unresolved.
    fn flush_queue(&mut self, ctx: &mut NdpCtx<'_>, idx: Index) {
        let nbr = &mut self.arena[idx];
        let Some(mac) = nbr.mac else {
            return;
        };
        for mut packet in nbr.tx_queue.drain(..) {
            packet.dst_mac = Some(mac);
            if let Err(error) = ctx.link.transmit(packet) {
                error.log();
            }
        }
    }

    fn start_timer(
        &mut self,
        ctx: &mut NdpCtx<'_>,
        idx: Index,
        timeout: Duration,
    ) {
        self.next_timer_gen += 1;
        let timer_gen = self.next_timer_gen;

        let nbr = &mut self.arena[idx];
        nbr.timer_gen = timer_gen;
        nbr.timer = Some(tasks::nbr_timeout(
            self.if_nbr,
            idx,
            timer_gen,
            timeout,
            ctx.nbr_timeoutp,
        ));
    }
}
