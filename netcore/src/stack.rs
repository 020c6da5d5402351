//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use netcore_utils::mac_addr::MacAddr;
use netcore_utils::task::Task;
use netcore_utils::{Receiver, Sender, UnboundedReceiver, UnboundedSender};
use rand::Rng;
use tokio::sync::mpsc;

use crate::autoip::{self, AutoIpState};
use crate::buffer::{BufPoolKind, BufPoolStats, NetBuf};
use crate::config::{Config, DhcpCfg, NdpSolicitKind, NdpTimeoutKind};
use crate::conn::{ConnId, ConnProto, ConnTable};
use crate::device::{DevKind, NetDevApi, NetProto, NetRxPacketMsg};
use crate::dhcp;
use crate::error::Error;
use crate::events;
use crate::hook::{AddrCfgHook, AddrCfgStatus};
use crate::icmp::{EchoHandle, EchoPacket, EchoService};
use crate::interface::{IfNbr, Interface};
use crate::ipv4::{AddrCfgMode, Ipv4AddrObj};
use crate::ipv6::Ipv6AddrObj;
use crate::stat::NetStatPool;
use crate::tasks;
use crate::tasks::messages::ProtocolInputMsg;
use crate::tasks::messages::input::{
    AutoIpTimeoutMsg, DadTimeoutMsg, DhcpTimeoutMsg, GroupReportTimerMsg,
    NbrTimeoutMsg,
};

/// Network core instance.
///
/// Owns every interface together with its address tables, multicast groups,
/// neighbor cache and address configuration sessions. All mutations go
/// through `&mut Stack`; tasks running in other contexts wrap it in
/// `Arc<Mutex<Stack>>`.
#[derive(Debug)]
pub struct Stack {
    pub(crate) config: Config,
    pub(crate) interfaces: BTreeMap<IfNbr, Interface>,
    pub(crate) conns: ConnTable,
    pub(crate) echo: Arc<EchoService>,
    pub(crate) tx: ProtocolInputChannelsTx,
    next_if_nbr: IfNbr,
}

#[derive(Clone, Debug)]
pub struct ProtocolInputChannelsTx {
    // Packets received by the device drivers.
    pub net_rx: Sender<NetRxPacketMsg>,
    // Multicast report timer.
    pub group_report_timer: UnboundedSender<GroupReportTimerMsg>,
    // Neighbor cache timer.
    pub nbr_timeout: UnboundedSender<NbrTimeoutMsg>,
    // Duplicate address detection timer.
    pub dad_timeout: UnboundedSender<DadTimeoutMsg>,
    // DHCP client timer.
    pub dhcp_timeout: UnboundedSender<DhcpTimeoutMsg>,
    // IPv4 link-local timer.
    pub autoip_timeout: UnboundedSender<AutoIpTimeoutMsg>,
}

#[derive(Debug)]
pub struct ProtocolInputChannelsRx {
    // Packets received by the device drivers.
    pub net_rx: Receiver<NetRxPacketMsg>,
    // Multicast report timer.
    pub group_report_timer: UnboundedReceiver<GroupReportTimerMsg>,
    // Neighbor cache timer.
    pub nbr_timeout: UnboundedReceiver<NbrTimeoutMsg>,
    // Duplicate address detection timer.
    pub dad_timeout: UnboundedReceiver<DadTimeoutMsg>,
    // DHCP client timer.
    pub dhcp_timeout: UnboundedReceiver<DhcpTimeoutMsg>,
    // IPv4 link-local timer.
    pub autoip_timeout: UnboundedReceiver<AutoIpTimeoutMsg>,
}

// ===== impl Stack =====

impl Stack {
    /// Creates a network core instance from a validated configuration.
    ///
    /// The returned receivers feed `tasks::event_loop`, or any other task
    /// that hands their messages to `process_protocol_msg`.
    pub fn new(
        config: Config,
    ) -> Result<(Stack, ProtocolInputChannelsRx), Error> {
        config.validate()?;

        let (tx, rx) = protocol_input_channels(config.rx_queue_size as usize);
        let echo_id = rand::rng().random();
        let stack = Stack {
            conns: ConnTable::new(&config.conn),
            echo: EchoService::new(echo_id, config.icmp.echo_req_max as usize),
            interfaces: Default::default(),
            tx,
            next_if_nbr: 0,
            config,
        };

        Ok((stack, rx))
    }

    /// Creates a network core instance and spawns its event loop.
    ///
    /// Dropping the returned task stops the event loop.
    pub fn spawn(
        config: Config,
    ) -> Result<(Arc<Mutex<Stack>>, Task<()>), Error> {
        let (stack, rx) = Stack::new(config)?;
        let stack = Arc::new(Mutex::new(stack));
        let task = Task::spawn(tasks::event_loop(stack.clone(), rx));
        Ok((stack, task))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn echo(&self) -> &Arc<EchoService> {
        &self.echo
    }

    pub fn conns(&self) -> &ConnTable {
        &self.conns
    }

    pub fn interface(&self, if_nbr: IfNbr) -> Option<&Interface> {
        self.interfaces.get(&if_nbr)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> + '_ {
        self.interfaces.values()
    }

    // ===== interfaces =====

    /// Registers a network device, returning the number of its interface.
    ///
    /// The interface starts down and without addresses.
    pub fn if_add(
        &mut self,
        name: impl Into<String>,
        kind: DevKind,
        mac: MacAddr,
        dev: Box<dyn NetDevApi>,
    ) -> Result<IfNbr, Error> {
        let if_nbr = self.next_if_nbr;
        self.next_if_nbr = if_nbr
            .checked_add(1)
            .ok_or(Error::Fault("interface numbers exhausted"))?;

        let iface =
            Interface::new(if_nbr, name.into(), kind, mac, dev, &self.config);
        self.interfaces.insert(if_nbr, iface);

        Ok(if_nbr)
    }

    pub fn if_start(&mut self, if_nbr: IfNbr) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        iface.start(&self.config, &self.tx)
    }

    pub fn if_stop(&mut self, if_nbr: IfNbr) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        iface.stop()
    }

    // ===== buffers =====

    pub fn buf_stats(&self, if_nbr: IfNbr) -> Result<BufPoolStats, Error> {
        let iface = interface(&self.interfaces, if_nbr)?;
        Ok(iface.link.bufs.stats())
    }

    pub fn buf_reset_high_water(&self, if_nbr: IfNbr) -> Result<(), Error> {
        let iface = interface(&self.interfaces, if_nbr)?;
        iface.link.bufs.reset_high_water();
        Ok(())
    }

    pub fn buf_alloc(
        &self,
        if_nbr: IfNbr,
        kind: BufPoolKind,
        size: usize,
    ) -> Result<NetBuf, Error> {
        let iface = interface(&self.interfaces, if_nbr)?;
        iface.link.bufs.alloc(kind, size)
    }

    // ===== IPv4 addresses =====

    /// Statically configures an IPv4 address on an interface.
    ///
    /// Fails with `InvalidState` while a DHCP session is acquiring an
    /// address, and with `AddrInUse` if another interface holds the host.
    pub fn ipv4_add(
        &mut self,
        if_nbr: IfNbr,
        host: Ipv4Addr,
        mask: Ipv4Addr,
        gateway: Option<Ipv4Addr>,
    ) -> Result<(), Error> {
        let obj = Ipv4AddrObj::new(host, mask, gateway, AddrCfgMode::Static)?;
        if let Some(other) = self
            .interfaces
            .values()
            .find(|iface| iface.nbr() != if_nbr && iface.ipv4.contains(&host))
        {
            return Err(Error::AddrInUse(other.nbr(), host.into()));
        }

        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        if iface.ipv4.cfg_mode() == AddrCfgMode::DynamicInit {
            return Err(Error::InvalidState(if_nbr, "DHCP in progress"));
        }
        iface.ipv4.add(obj)
    }

    pub fn ipv4_remove(
        &mut self,
        if_nbr: IfNbr,
        host: &Ipv4Addr,
    ) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        iface.ipv4.remove(host)?;
        Ok(())
    }

    pub fn ipv4_remove_all(&mut self, if_nbr: IfNbr) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        iface.ipv4.remove_all();
        Ok(())
    }

    pub fn ipv4_get_hosts(
        &self,
        if_nbr: IfNbr,
        out: &mut [Ipv4Addr],
    ) -> Result<usize, Error> {
        let iface = interface(&self.interfaces, if_nbr)?;
        iface.ipv4.get_hosts(out)
    }

    /// Selects a local source address towards `remote` across every
    /// interface, in interface number order.
    ///
    /// Subnet matches win over the first valid address of any interface.
    pub fn ipv4_get_source_for(&self, remote: &Ipv4Addr) -> Option<Ipv4Addr> {
        self.ipv4_route(remote).map(|(_, src)| src)
    }

    pub fn get_addr_subnet_mask(
        &self,
        host: &Ipv4Addr,
    ) -> Result<Ipv4Addr, Error> {
        self.ipv4_addr_obj(host).map(|obj| obj.mask)
    }

    pub fn get_addr_dflt_gateway(
        &self,
        host: &Ipv4Addr,
    ) -> Result<Option<Ipv4Addr>, Error> {
        self.ipv4_addr_obj(host).map(|obj| obj.gateway)
    }

    // Returns true if `addr` is configured on any interface.
    pub fn is_cfgd(&self, addr: &Ipv4Addr) -> bool {
        self.ipv4_addr_obj(addr).is_ok()
    }

    // Returns true if `addr` is the directed broadcast of any configured
    // subnet.
    pub fn is_subnet_bcast(&self, addr: &Ipv4Addr) -> bool {
        self.interfaces
            .values()
            .any(|iface| iface.ipv4.is_subnet_bcast(addr))
    }

    // ===== IPv6 addresses =====

    /// Adds an IPv6 address. The address stays tentative until duplicate
    /// address detection completes, which `hook` is told about.
    pub fn ipv6_add(
        &mut self,
        if_nbr: IfNbr,
        addr: Ipv6Addr,
        prefix_len: u8,
        hook: Option<Arc<dyn AddrCfgHook>>,
    ) -> Result<(), Error> {
        let obj = Ipv6AddrObj::new(addr, prefix_len, AddrCfgMode::Static)?;
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        iface.ipv6_add(&self.config, &self.tx, obj, hook)
    }

    /// Configures the link-local address derived from the interface
    /// hardware address (RFC 4291, appendix A).
    pub fn ipv6_cfg_link_local(
        &mut self,
        if_nbr: IfNbr,
        hook: Option<Arc<dyn AddrCfgHook>>,
    ) -> Result<Ipv6Addr, Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        let addr = iface.link.mac.to_link_local_ipv6();
        let obj = Ipv6AddrObj::new(addr, 64, AddrCfgMode::AutoCfg)?;
        iface.ipv6_add(&self.config, &self.tx, obj, hook)?;
        Ok(addr)
    }

    pub fn ipv6_remove(
        &mut self,
        if_nbr: IfNbr,
        addr: &Ipv6Addr,
    ) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        iface.ipv6_remove(&self.config, &self.tx, addr)
    }

    pub fn ipv6_get_source_for(&self, remote: &Ipv6Addr) -> Option<Ipv6Addr> {
        self.ipv6_route(remote).map(|(_, src)| src)
    }

    // ===== multicast =====

    pub fn igmp_join(
        &mut self,
        if_nbr: IfNbr,
        group: Ipv4Addr,
    ) -> Result<(), Error> {
        let iface = interface_up(&mut self.interfaces, if_nbr)?;
        iface.igmp_with(&self.config, &self.tx, |igmp, ctx| {
            igmp.join(ctx, group)
        })
    }

    pub fn igmp_leave(
        &mut self,
        if_nbr: IfNbr,
        group: Ipv4Addr,
    ) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        iface.igmp_with(&self.config, &self.tx, |igmp, ctx| {
            igmp.leave(ctx, group)
        })
    }

    pub fn igmp_is_joined(
        &self,
        if_nbr: IfNbr,
        group: &Ipv4Addr,
    ) -> Result<bool, Error> {
        let iface = interface(&self.interfaces, if_nbr)?;
        Ok(iface.igmp.is_joined(group))
    }

    pub fn mld_join(
        &mut self,
        if_nbr: IfNbr,
        group: Ipv6Addr,
    ) -> Result<(), Error> {
        let iface = interface_up(&mut self.interfaces, if_nbr)?;
        iface.mld_with(&self.config, &self.tx, |mld, ctx| mld.join(ctx, group))
    }

    pub fn mld_leave(
        &mut self,
        if_nbr: IfNbr,
        group: Ipv6Addr,
    ) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        iface.mld_with(&self.config, &self.tx, |mld, ctx| {
            mld.leave(ctx, group)
        })
    }

    pub fn mld_is_joined(
        &self,
        if_nbr: IfNbr,
        group: &Ipv6Addr,
    ) -> Result<bool, Error> {
        let iface = interface(&self.interfaces, if_nbr)?;
        Ok(iface.mld.is_joined(group))
    }

    // ===== ICMP echo =====

    /// Sends an echo request to `dest`.
    ///
    /// Returns once the request is handed to the device; the returned
    /// handle waits for the reply until `timeout` elapses.
    pub fn tx_echo_req(
        &mut self,
        dest: IpAddr,
        timeout: Duration,
        data: &[u8],
    ) -> Result<EchoHandle, Error> {
        let data = Bytes::copy_from_slice(data);
        match dest {
            IpAddr::V4(dest4) => {
                let (if_nbr, src) = self
                    .ipv4_route(&dest4)
                    .ok_or(Error::NoSourceAddr(dest))?;
                let handle = self.echo.register(dest, data.clone(), timeout)?;
                let pkt = EchoPacket::request(handle.id(), handle.seq(), data);
                let dst_mac = dest4
                    .is_multicast()
                    .then(|| MacAddr::from_ipv4_mcast(&dest4));

                let iface = interface_mut(&mut self.interfaces, if_nbr)?;
                iface.link.send(
                    NetProto::Icmpv4,
                    src.into(),
                    dest,
                    dst_mac,
                    &pkt.encode_v4(),
                )?;
                Ok(handle)
            }
            IpAddr::V6(dest6) => {
                let (if_nbr, src) = self
                    .ipv6_route(&dest6)
                    .ok_or(Error::NoSourceAddr(dest))?;
                let handle = self.echo.register(dest, data.clone(), timeout)?;
                let pkt = EchoPacket::request(handle.id(), handle.seq(), data);

                let iface = interface_mut(&mut self.interfaces, if_nbr)?;
                let packet = iface.link.build(
                    NetProto::Icmpv6,
                    src.into(),
                    dest,
                    None,
                    &pkt.encode_v6(&src, &dest6),
                )?;
                iface.ndp_send(&self.config, &self.tx, packet)?;
                Ok(handle)
            }
        }
    }

    // ===== connections =====

    pub fn conn_alloc(
        &mut self,
        proto: ConnProto,
        local: SocketAddr,
        remote: Option<SocketAddr>,
    ) -> Result<ConnId, Error> {
        self.conns.alloc(proto, local, remote)
    }

    pub fn conn_free(&mut self, id: ConnId) -> Result<(), Error> {
        self.conns.free(id)
    }

    pub fn conn_lookup(
        &mut self,
        proto: ConnProto,
        local: SocketAddr,
        remote: SocketAddr,
    ) -> Option<ConnId> {
        self.conns.lookup(proto, local, remote)
    }

    pub fn conn_stats(&self) -> NetStatPool {
        self.conns.stats()
    }

    pub fn conn_reset_high_water(&mut self) {
        self.conns.reset_high_water();
    }

    pub fn cfg_conn_access_th(&mut self, count: u16) -> Result<(), Error> {
        self.conns.set_access_th(count)?;
        self.config.conn.set_access_th(count)
    }

    // ===== neighbor discovery configuration =====

    pub fn cfg_neighbor_cache_timeout(
        &mut self,
        secs: u16,
    ) -> Result<(), Error> {
        self.config.ndp.set_cache_timeout(secs)
    }

    pub fn cfg_reachability_timeout(
        &mut self,
        kind: NdpTimeoutKind,
        secs: u16,
    ) -> Result<(), Error> {
        self.config.ndp.set_timeout(kind, secs)
    }

    pub fn cfg_solicit_max_nbr(
        &mut self,
        kind: NdpSolicitKind,
        count: u8,
    ) -> Result<(), Error> {
        self.config.ndp.set_solicit_max(kind, count)
    }

    pub fn cfg_cache_tx_q_max_th(&mut self, count: u8) -> Result<(), Error> {
        self.config.ndp.set_tx_q_max_th(count)
    }

    // ===== dynamic address configuration =====

    /// Starts a DHCP client session on an interface.
    ///
    /// The session replaces the interface addresses; `hook` is invoked once
    /// the attempt completes.
    pub fn dhcp_start(
        &mut self,
        if_nbr: IfNbr,
        cfg: DhcpCfg,
        hook: Option<Arc<dyn AddrCfgHook>>,
    ) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        dhcp::start(iface, cfg, hook, &self.tx)
    }

    pub fn dhcp_stop(&mut self, if_nbr: IfNbr) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        dhcp::stop(iface)
    }

    pub fn dhcp_status(&self, if_nbr: IfNbr) -> Result<AddrCfgStatus, Error> {
        let iface = interface(&self.interfaces, if_nbr)?;
        Ok(iface
            .dhcp
            .as_ref()
            .map(|session| session.status)
            .unwrap_or(AddrCfgStatus::None))
    }

    /// Starts IPv4 link-local address configuration on an interface.
    pub fn autoip_start(
        &mut self,
        if_nbr: IfNbr,
        hook: Option<Arc<dyn AddrCfgHook>>,
    ) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        autoip::start(iface, &self.config.autoip, hook, false, &self.tx)
    }

    pub fn autoip_stop(&mut self, if_nbr: IfNbr) -> Result<(), Error> {
        let iface = interface_mut(&mut self.interfaces, if_nbr)?;
        autoip::stop(iface)
    }

    pub fn autoip_state(
        &self,
        if_nbr: IfNbr,
    ) -> Result<Option<AutoIpState>, Error> {
        let iface = interface(&self.interfaces, if_nbr)?;
        Ok(iface.autoip.as_ref().map(|session| session.state))
    }

    // ===== input processing =====

    /// Processes a message received on one of the stack input channels.
    pub fn process_protocol_msg(&mut self, msg: ProtocolInputMsg) {
        let result = match msg {
            ProtocolInputMsg::NetRxPacket(msg) => {
                events::process_packet(self, msg)
            }
            ProtocolInputMsg::GroupReportTimer(msg) => {
                events::process_group_report_timer(
                    self,
                    msg.if_nbr,
                    msg.group,
                    msg.timer_gen,
                )
            }
            ProtocolInputMsg::NbrTimeout(msg) => events::process_nbr_timeout(
                self,
                msg.if_nbr,
                msg.nbr_idx,
                msg.timer_gen,
            ),
            ProtocolInputMsg::DadTimeout(msg) => events::process_dad_timeout(
                self,
                msg.if_nbr,
                msg.addr,
                msg.timer_gen,
            ),
            ProtocolInputMsg::DhcpTimeout(msg) => {
                events::process_dhcp_timeout(self, msg.if_nbr, msg.timer_gen)
            }
            ProtocolInputMsg::AutoIpTimeout(msg) => {
                events::process_autoip_timeout(self, msg.if_nbr, msg.timer_gen)
            }
        };
        if let Err(error) = result {
            error.log();
        }
    }

    // ===== helper methods =====

    fn ipv4_addr_obj(&self, host: &Ipv4Addr) -> Result<&Ipv4AddrObj, Error> {
        self.interfaces
            .values()
            .find_map(|iface| iface.ipv4.get(host))
            .ok_or(Error::AddrNotFound((*host).into()))
    }

    // Outgoing interface and source address towards an IPv4 destination.
    fn ipv4_route(&self, remote: &Ipv4Addr) -> Option<(IfNbr, Ipv4Addr)> {
        let up = || self.interfaces.values().filter(|iface| iface.up);
        up().find_map(|iface| {
            iface.ipv4.subnet_match(remote).map(|obj| (iface.nbr(), obj.host))
        })
        .or_else(|| {
            up().find_map(|iface| {
                iface.ipv4.first_valid().map(|obj| (iface.nbr(), obj.host))
            })
        })
    }

    // Outgoing interface and source address towards an IPv6 destination.
    fn ipv6_route(&self, remote: &Ipv6Addr) -> Option<(IfNbr, Ipv6Addr)> {
        let up = || self.interfaces.values().filter(|iface| iface.up);
        up().find_map(|iface| {
            iface
                .ipv6
                .iter()
                .filter(|obj| obj.is_preferred())
                .find(|obj| obj.network.contains(*remote))
                .map(|obj| (iface.nbr(), obj.addr))
        })
        .or_else(|| {
            up().find_map(|iface| {
                iface
                    .ipv6
                    .get_source_for(remote)
                    .map(|src| (iface.nbr(), src))
            })
        })
    }
}

// ===== impl ProtocolInputChannelsRx =====

impl ProtocolInputChannelsRx {
    pub async fn recv(&mut self) -> Option<ProtocolInputMsg> {
        tokio::select! {
            biased;
            msg = self.group_report_timer.recv() => {
                msg.map(ProtocolInputMsg::GroupReportTimer)
            }
            msg = self.nbr_timeout.recv() => {
                msg.map(ProtocolInputMsg::NbrTimeout)
            }
            msg = self.dad_timeout.recv() => {
                msg.map(ProtocolInputMsg::DadTimeout)
            }
            msg = self.dhcp_timeout.recv() => {
                msg.map(ProtocolInputMsg::DhcpTimeout)
            }
            msg = self.autoip_timeout.recv() => {
                msg.map(ProtocolInputMsg::AutoIpTimeout)
            }
            msg = self.net_rx.recv() => {
                msg.map(ProtocolInputMsg::NetRxPacket)
            }
        }
    }
}

// ===== helper functions =====

fn protocol_input_channels(
    rx_queue_size: usize,
) -> (ProtocolInputChannelsTx, ProtocolInputChannelsRx) {
    let (net_rxp, net_rxc) = mpsc::channel(rx_queue_size);
    let (group_report_timerp, group_report_timerc) = mpsc::unbounded_channel();
    let (nbr_timeoutp, nbr_timeoutc) = mpsc::unbounded_channel();
    let (dad_timeoutp, dad_timeoutc) = mpsc::unbounded_channel();
    let (dhcp_timeoutp, dhcp_timeoutc) = mpsc::unbounded_channel();
    let (autoip_timeoutp, autoip_timeoutc) = mpsc::unbounded_channel();

    let tx = ProtocolInputChannelsTx {
        net_rx: net_rxp,
        group_report_timer: group_report_timerp,
        nbr_timeout: nbr_timeoutp,
        dad_timeout: dad_timeoutp,
        dhcp_timeout: dhcp_timeoutp,
        autoip_timeout: autoip_timeoutp,
    };
    let rx = ProtocolInputChannelsRx {
        net_rx: net_rxc,
        group_report_timer: group_report_timerc,
        nbr_timeout: nbr_timeoutc,
        dad_timeout: dad_timeoutc,
        dhcp_timeout: dhcp_timeoutc,
        autoip_timeout: autoip_timeoutc,
    };

    (tx, rx)
}

fn interface(
    interfaces: &BTreeMap<IfNbr, Interface>,
    if_nbr: IfNbr,
) -> Result<&Interface, Error> {
    interfaces
        .get(&if_nbr)
        .ok_or(Error::InterfaceNotFound(if_nbr))
}

pub(crate) fn interface_mut(
    interfaces: &mut BTreeMap<IfNbr, Interface>,
    if_nbr: IfNbr,
) -> Result<&mut Interface, Error> {
    interfaces
        .get_mut(&if_nbr)
        .ok_or(Error::InterfaceNotFound(if_nbr))
}

// Same as `interface_mut`, also requiring the interface to be up.
fn interface_up(
    interfaces: &mut BTreeMap<IfNbr, Interface>,
    if_nbr: IfNbr,
) -> Result<&mut Interface, Error> {
    let iface = interface_mut(interfaces, if_nbr)?;
    if !iface.up {
        return Err(Error::InvalidState(if_nbr, "interface down"));
    }
    Ok(iface)
}
