//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use netcore_utils::ip::Ipv4AddrExt;
use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::error::Error;
use crate::interface::IfNbr;

// How an address (or an interface address table) got configured.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AddrCfgMode {
    #[default]
    None,
    Dynamic,
    DynamicInit,
    Static,
    AutoCfg,
}

// IPv4 address object.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Ipv4AddrObj {
    pub host: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub host_mask: Ipv4Addr,
    pub network: Ipv4Network,
    pub gateway: Option<Ipv4Addr>,
    pub mode: AddrCfgMode,
    pub valid: bool,
    pub created: DateTime<Utc>,
}

// Per-interface IPv4 address table, kept in registration order.
#[derive(Debug)]
pub struct Ipv4Addrs {
    if_nbr: IfNbr,
    addrs: Vec<Ipv4AddrObj>,
    max: usize,
    cfg_mode: AddrCfgMode,
}

// ===== impl Ipv4AddrObj =====

impl Ipv4AddrObj {
    /// Validates and builds an address object.
    ///
    /// A gateway, when given, must be a usable host of the same subnet and
    /// differ from the host itself.
    pub fn new(
        host: Ipv4Addr,
        mask: Ipv4Addr,
        gateway: Option<Ipv4Addr>,
        mode: AddrCfgMode,
    ) -> Result<Ipv4AddrObj, Error> {
        let Some(prefixlen) = mask.mask_prefixlen() else {
            return Err(Error::InvalidSubnetMask(mask));
        };
        if !host.is_valid_host_in(mask) {
            return Err(Error::InvalidAddrHost(host.into()));
        }
        let network = Ipv4Network::new(host, prefixlen)
            .map_err(|_| Error::InvalidSubnetMask(mask))?;

        if let Some(gateway) = gateway {
            if gateway == host
                || !gateway.is_valid_host_in(mask)
                || !network.contains(gateway)
            {
                return Err(Error::InvalidGateway(gateway));
            }
        }

        Ok(Ipv4AddrObj {
            host,
            mask,
            host_mask: !mask,
            network,
            gateway,
            mode,
            valid: true,
            created: Utc::now(),
        })
    }

    pub fn subnet(&self) -> Ipv4Addr {
        self.network.network()
    }

    pub fn subnet_broadcast(&self) -> Ipv4Addr {
        self.network.broadcast()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.network.contains(addr)
    }
}

// ===== impl Ipv4Addrs =====

impl Ipv4Addrs {
    pub(crate) fn new(if_nbr: IfNbr, max: usize) -> Ipv4Addrs {
        Ipv4Addrs {
            if_nbr,
            addrs: Vec::with_capacity(max),
            max,
            cfg_mode: AddrCfgMode::None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ipv4AddrObj> + '_ {
        self.addrs.iter()
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn get(&self, host: &Ipv4Addr) -> Option<&Ipv4AddrObj> {
        self.addrs.iter().find(|obj| obj.host == *host)
    }

    pub fn contains(&self, host: &Ipv4Addr) -> bool {
        self.get(host).is_some()
    }

    // Interface-wide configuration mode. DynamicInit while a DHCP session is
    // in progress, Dynamic once it bound an address.
    pub fn cfg_mode(&self) -> AddrCfgMode {
        self.cfg_mode
    }

    pub(crate) fn set_cfg_mode(&mut self, mode: AddrCfgMode) {
        self.cfg_mode = mode;
    }

    pub(crate) fn add(&mut self, obj: Ipv4AddrObj) -> Result<(), Error> {
        if self.contains(&obj.host) {
            return Err(Error::AddrDuplicate(self.if_nbr, obj.host.into()));
        }
        if self.addrs.len() >= self.max {
            return Err(Error::AddrTableFull(self.if_nbr));
        }

        Debug::AddrAdd(self.if_nbr, &obj.host.into(), &obj.mode).log();
        if self.cfg_mode == AddrCfgMode::None {
            self.cfg_mode = obj.mode;
        }
        self.addrs.push(obj);

        Ok(())
    }

    pub(crate) fn remove(
        &mut self,
        host: &Ipv4Addr,
    ) -> Result<Ipv4AddrObj, Error> {
        let Some(pos) = self.addrs.iter().position(|obj| obj.host == *host)
        else {
            return Err(Error::AddrNotFound((*host).into()));
        };

        let obj = self.addrs.remove(pos);
        Debug::AddrRemove(self.if_nbr, &obj.host.into()).log();
        if self.addrs.is_empty() && self.cfg_mode != AddrCfgMode::DynamicInit
        {
            self.cfg_mode = AddrCfgMode::None;
        }

        Ok(obj)
    }

    pub(crate) fn remove_all(&mut self) {
        for obj in self.addrs.drain(..) {
            Debug::AddrRemove(self.if_nbr, &obj.host.into()).log();
        }
        if self.cfg_mode != AddrCfgMode::DynamicInit {
            self.cfg_mode = AddrCfgMode::None;
        }
    }

    // Removes every address configured with the given mode.
    pub(crate) fn remove_mode(&mut self, mode: AddrCfgMode) {
        let hosts = self
            .addrs
            .iter()
            .filter(|obj| obj.mode == mode)
            .map(|obj| obj.host)
            .collect::<Vec<_>>();
        for host in hosts {
            let _ = self.remove(&host);
        }
    }

    // Atomically replaces the whole table with a dynamically learned address.
    pub(crate) fn replace_all(&mut self, obj: Ipv4AddrObj) {
        self.addrs.clear();
        Debug::AddrAdd(self.if_nbr, &obj.host.into(), &obj.mode).log();
        self.cfg_mode = obj.mode;
        self.addrs.push(obj);
    }

    /// Copies the configured hosts into `out`, returning how many were
    /// written.
    pub fn get_hosts(&self, out: &mut [Ipv4Addr]) -> Result<usize, Error> {
        if out.len() < self.addrs.len() {
            return Err(Error::AddrTableSize(self.addrs.len()));
        }

        for (slot, obj) in out.iter_mut().zip(self.addrs.iter()) {
            *slot = obj.host;
        }
        Ok(self.addrs.len())
    }

    // Returns the first valid address whose subnet contains `remote`.
    pub fn subnet_match(&self, remote: &Ipv4Addr) -> Option<&Ipv4AddrObj> {
        self.addrs
            .iter()
            .filter(|obj| obj.valid)
            .find(|obj| obj.contains(*remote))
    }

    pub fn first_valid(&self) -> Option<&Ipv4AddrObj> {
        self.addrs.iter().find(|obj| obj.valid)
    }

    /// Selects the source address to use towards `remote`.
    ///
    /// Subnet matches win, otherwise the first valid address is used;
    /// registration order breaks ties.
    pub fn get_source_for(&self, remote: &Ipv4Addr) -> Option<Ipv4Addr> {
        self.subnet_match(remote)
            .or_else(|| self.first_valid())
            .map(|obj| obj.host)
    }

    // Returns true if `addr` is the directed broadcast of a configured
    // subnet.
    pub fn is_subnet_bcast(&self, addr: &Ipv4Addr) -> bool {
        self.addrs.iter().any(|obj| {
            obj.network.prefix() < 31 && obj.subnet_broadcast() == *addr
        })
    }
}
