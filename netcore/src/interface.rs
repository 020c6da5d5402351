//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use bytes::BufMut;
use netcore_utils::ip::Ipv6AddrExt;
use netcore_utils::mac_addr::MacAddr;

use crate::autoip::{self, AutoIpSession};
use crate::buffer::BufPools;
use crate::config::{Config, NdpSolicitKind, NdpTimeoutKind};
use crate::debug::Debug;
use crate::device::{DevKind, NetDevApi, NetProto, NetTxPacket, RxHandoff};
use crate::dhcp::{self, DhcpSession};
use crate::error::{Error, IoError};
use crate::hook::{AddrCfgHook, AddrCfgOutcome, AddrCfgStatus, HookSlot};
use crate::ipv4::Ipv4Addrs;
use crate::ipv6::{Ipv6AddrObj, Ipv6Addrs};
use crate::mcast::{Igmpv1, McastCtx, McastGroups, Mldv1};
use crate::ndp::NdpCtx;
use crate::ndp::dad::{DadEntry, DadTable};
use crate::ndp::neighbor::NeighborCache;
use crate::stack::ProtocolInputChannelsTx;

// Interface number, assigned by the stack in creation order.
pub type IfNbr = u16;

// Link-layer attachment of an interface: its device and buffer pools.
#[derive(Debug)]
pub struct Link {
    pub if_nbr: IfNbr,
    pub mac: MacAddr,
    pub bufs: BufPools,
    dev: Box<dyn NetDevApi>,
}

#[derive(Debug)]
pub struct Interface {
    pub name: String,
    pub kind: DevKind,
    pub up: bool,
    pub link: Link,
    pub ipv4: Ipv4Addrs,
    pub ipv6: Ipv6Addrs,
    pub igmp: McastGroups<Igmpv1>,
    pub mld: McastGroups<Mldv1>,
    pub ndp: NeighborCache,
    pub dad: DadTable,
    pub dhcp: Option<DhcpSession>,
    pub autoip: Option<AutoIpSession>,
    timer_gen: u64,
}

// ===== impl Link =====

impl Link {
    /// Copies `data` into a transmit buffer and hands it to the device.
    pub(crate) fn send(
        &mut self,
        proto: NetProto,
        src: IpAddr,
        dst: IpAddr,
        dst_mac: Option<MacAddr>,
        data: &[u8],
    ) -> Result<(), Error> {
        let packet = self.build(proto, src, dst, dst_mac, data)?;
        self.transmit(packet)
    }

    pub(crate) fn build(
        &self,
        proto: NetProto,
        src: IpAddr,
        dst: IpAddr,
        dst_mac: Option<MacAddr>,
        data: &[u8],
    ) -> Result<NetTxPacket, Error> {
        let mut buf = self.bufs.alloc_tx(data.len())?;
        buf.data_mut().put_slice(data);

        Ok(NetTxPacket {
            if_nbr: self.if_nbr,
            proto,
            src,
            dst,
            dst_mac,
            buf,
        })
    }

    // The device owns the buffer from here on, even when transmission
    // fails.
    pub(crate) fn transmit(
        &mut self,
        packet: NetTxPacket,
    ) -> Result<(), Error> {
        Debug::PacketTx(&packet).log();
        self.dev
            .tx(packet)
            .map_err(|error| IoError::DevTxError(self.if_nbr, error).into())
    }

    fn open(&mut self, rx: RxHandoff) -> Result<(), Error> {
        self.dev
            .open(rx)
            .map_err(|error| IoError::DevOpenError(self.if_nbr, error).into())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.dev
            .close()
            .map_err(|error| IoError::DevCloseError(self.if_nbr, error).into())
    }

    fn start(&mut self) -> Result<(), Error> {
        self.dev
            .start()
            .map_err(|error| IoError::DevStartError(self.if_nbr, error).into())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.dev
            .stop()
            .map_err(|error| IoError::DevStopError(self.if_nbr, error).into())
    }
}

// ===== impl Interface =====

impl Interface {
    pub(crate) fn new(
        if_nbr: IfNbr,
        name: String,
        kind: DevKind,
        mac: MacAddr,
        dev: Box<dyn NetDevApi>,
        config: &Config,
    ) -> Interface {
        Debug::InterfaceCreate(if_nbr, &name).log();

        Interface {
            name,
            kind,
            up: false,
            link: Link {
                if_nbr,
                mac,
                bufs: BufPools::new(if_nbr, &config.buffers),
                dev,
            },
            ipv4: Ipv4Addrs::new(if_nbr, config.ipv4.addrs_max as usize),
            ipv6: Ipv6Addrs::new(if_nbr, config.ipv6.addrs_max as usize),
            igmp: McastGroups::new(if_nbr),
            mld: McastGroups::new(if_nbr),
            ndp: NeighborCache::new(if_nbr),
            dad: DadTable::new(if_nbr),
            dhcp: None,
            autoip: None,
            timer_gen: 0,
        }
    }

    pub fn nbr(&self) -> IfNbr {
        self.link.if_nbr
    }

    pub(crate) fn next_timer_gen(&mut self) -> u64 {
        self.timer_gen += 1;
        self.timer_gen
    }

    // Opens and starts the device, handing it the receive path.
    //
    // IPv6 addresses kept across a stop rejoin their solicited-node groups.
    pub(crate) fn start(
        &mut self,
        config: &Config,
        tx: &ProtocolInputChannelsTx,
    ) -> Result<(), Error> {
        if self.up {
            return Err(Error::InvalidState(self.nbr(), "interface up"));
        }

        Debug::InterfaceStart(self.nbr()).log();
        let rx = RxHandoff::new(
            self.nbr(),
            self.link.bufs.clone(),
            tx.net_rx.clone(),
        );
        self.link.open(rx)?;
        if let Err(error) = self.link.start() {
            let _ = self.link.close();
            return Err(error);
        }
        self.up = true;

        let groups = self
            .ipv6
            .iter()
            .map(|obj| obj.addr.solicited_node())
            .collect::<Vec<_>>();
        for group in groups {
            if let Err(error) =
                self.mld_with(config, tx, |mld, ctx| mld.join(ctx, group))
            {
                error.log();
            }
        }

        Ok(())
    }

    /// Stops the device and every protocol running on the interface.
    ///
    /// Statically configured addresses are kept; dynamic state (sessions,
    /// groups, neighbors, detection in progress) is dropped without invoking
    /// any hook.
    pub(crate) fn stop(&mut self) -> Result<(), Error> {
        if !self.up {
            return Err(Error::InvalidState(self.nbr(), "interface down"));
        }

        Debug::InterfaceStop(self.nbr()).log();
        if self.dhcp.is_some() {
            let _ = dhcp::stop(self);
        }
        if self.autoip.is_some() {
            let _ = autoip::stop(self);
        }
        self.igmp.clear();
        self.mld.clear();
        self.ndp.clear();
        for addr in self.tentative_addrs() {
            let _ = self.ipv6.remove(&addr);
        }
        self.dad.clear();
        self.up = false;

        let result = self.link.stop();
        self.link.close()?;
        result
    }

    // Source address of IGMP messages.
    pub(crate) fn igmp_src(&self) -> Ipv4Addr {
        self.ipv4
            .first_valid()
            .map(|obj| obj.host)
            .unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    // Source address of MLD messages (RFC 2710, section 3).
    pub(crate) fn mld_src(&self) -> Ipv6Addr {
        self.ipv6
            .link_local()
            .map(|obj| obj.addr)
            .unwrap_or(Ipv6Addr::UNSPECIFIED)
    }

    // Source address of neighbor solicitations.
    fn ndp_src(&self) -> Option<Ipv6Addr> {
        self.ipv6.link_local().map(|obj| obj.addr).or_else(|| {
            self.ipv6
                .iter()
                .find(|obj| obj.is_preferred())
                .map(|obj| obj.addr)
        })
    }

    // Runs `f` against the IGMP groups of the interface.
    pub(crate) fn igmp_with<R>(
        &mut self,
        config: &Config,
        tx: &ProtocolInputChannelsTx,
        f: impl FnOnce(
            &mut McastGroups<Igmpv1>,
            &mut McastCtx<'_, Igmpv1>,
        ) -> R,
    ) -> R {
        let src = self.igmp_src();
        let mut ctx = McastCtx {
            link: &mut self.link,
            src,
            config,
            report_timerp: &tx.group_report_timer,
        };
        f(&mut self.igmp, &mut ctx)
    }

    // Runs `f` against the MLD groups of the interface.
    pub(crate) fn mld_with<R>(
        &mut self,
        config: &Config,
        tx: &ProtocolInputChannelsTx,
        f: impl FnOnce(
            &mut McastGroups<Mldv1>,
            &mut McastCtx<'_, Mldv1>,
        ) -> R,
    ) -> R {
        let src = self.mld_src();
        let mut ctx = McastCtx {
            link: &mut self.link,
            src,
            config,
            report_timerp: &tx.group_report_timer,
        };
        f(&mut self.mld, &mut ctx)
    }

    // Runs `f` against the neighbor cache of the interface.
    pub(crate) fn ndp_with<R>(
        &mut self,
        config: &Config,
        tx: &ProtocolInputChannelsTx,
        f: impl FnOnce(&mut NeighborCache, &mut NdpCtx<'_>) -> R,
    ) -> R {
        let src = self.ndp_src();
        let mut ctx = NdpCtx {
            link: &mut self.link,
            cfg: &config.ndp,
            src,
            nbr_timeoutp: &tx.nbr_timeout,
        };
        f(&mut self.ndp, &mut ctx)
    }

    // Sends an IPv6 packet, resolving its destination first.
    pub(crate) fn ndp_send(
        &mut self,
        config: &Config,
        tx: &ProtocolInputChannelsTx,
        packet: NetTxPacket,
    ) -> Result<(), Error> {
        self.ndp_with(config, tx, |ndp, ctx| {
            ndp.resolve_and_send(ctx, packet)
        })
    }

    /// Adds a tentative IPv6 address and starts duplicate address
    /// detection on it.
    ///
    /// The address first joins its solicited-node group. With detection
    /// disabled the address becomes preferred right away.
    pub(crate) fn ipv6_add(
        &mut self,
        config: &Config,
        tx: &ProtocolInputChannelsTx,
        obj: Ipv6AddrObj,
        hook: Option<Arc<dyn AddrCfgHook>>,
    ) -> Result<(), Error> {
        if !self.up {
            return Err(Error::InvalidState(self.nbr(), "interface down"));
        }

        let addr = obj.addr;
        self.ipv6.add(obj)?;

        let group = addr.solicited_node();
        if let Err(error) =
            self.mld_with(config, tx, |mld, ctx| mld.join(ctx, group))
        {
            let _ = self.ipv6.remove(&addr);
            return Err(error);
        }

        let mut hook = HookSlot::new(hook);
        let count = config.ndp.solicit_max(NdpSolicitKind::Dad);
        if count == 0 {
            self.ipv6.set_preferred(&addr);
            let outcome =
                AddrCfgOutcome::new(self.nbr(), AddrCfgStatus::Success)
                    .with_addr(addr, None, None);
            hook.fire(outcome);
            return Ok(());
        }

        let interval = config.ndp.timeout(NdpTimeoutKind::Solicit);
        if let Err(error) = self.dad.start(
            &mut self.link,
            addr,
            count,
            interval,
            hook,
            &tx.dad_timeout,
        ) {
            self.ipv6_forget(config, tx, &addr);
            return Err(error);
        }

        Ok(())
    }

    // Removes an IPv6 address, cancelling detection still in progress.
    pub(crate) fn ipv6_remove(
        &mut self,
        config: &Config,
        tx: &ProtocolInputChannelsTx,
        addr: &Ipv6Addr,
    ) -> Result<(), Error> {
        if !self.ipv6.contains(addr) {
            return Err(Error::AddrNotFound((*addr).into()));
        }
        self.dad.remove(addr);
        self.ipv6_forget(config, tx, addr);
        Ok(())
    }

    pub(crate) fn dad_complete(&mut self, mut entry: DadEntry) {
        Debug::DadSuccess(self.nbr(), &entry.addr).log();
        self.ipv6.set_preferred(&entry.addr);
        let outcome = AddrCfgOutcome::new(self.nbr(), AddrCfgStatus::Success)
            .with_addr(entry.addr, None, None);
        entry.hook.fire(outcome);
    }

    // Another node uses the tentative address.
    pub(crate) fn dad_conflict(
        &mut self,
        config: &Config,
        tx: &ProtocolInputChannelsTx,
        addr: &Ipv6Addr,
    ) {
        let Some(mut entry) = self.dad.remove(addr) else {
            return;
        };

        Debug::DadConflict(self.nbr(), addr).log();
        self.ipv6_forget(config, tx, addr);
        let outcome =
            AddrCfgOutcome::new(self.nbr(), AddrCfgStatus::FailAddrUsed)
                .with_addr(*addr, None, None);
        entry.hook.fire(outcome);
    }

    // Drops an address and, unless another address shares it, its
    // solicited-node group.
    fn ipv6_forget(
        &mut self,
        config: &Config,
        tx: &ProtocolInputChannelsTx,
        addr: &Ipv6Addr,
    ) {
        let shared = self.ipv6.shares_solicited_node(addr);
        let _ = self.ipv6.remove(addr);
        if !shared {
            let group = addr.solicited_node();
            let _ =
                self.mld_with(config, tx, |mld, ctx| mld.leave(ctx, group));
        }
    }

    fn tentative_addrs(&self) -> Vec<Ipv6Addr> {
        self.ipv6
            .iter()
            .filter(|obj| self.dad.contains(&obj.addr))
            .map(|obj| obj.addr)
            .collect()
    }
}
