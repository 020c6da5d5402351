//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use ipnetwork::Ipv6Network;
use netcore_utils::ip::Ipv6AddrExt;
use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::error::Error;
use crate::interface::IfNbr;
use crate::ipv4::AddrCfgMode;

// IPv6 address state (RFC 4862).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Ipv6AddrState {
    Tentative,
    Preferred,
}

// IPv6 address object.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Ipv6AddrObj {
    pub addr: Ipv6Addr,
    pub network: Ipv6Network,
    pub mode: AddrCfgMode,
    pub state: Ipv6AddrState,
}

// Per-interface IPv6 address table, kept in registration order.
#[derive(Debug)]
pub struct Ipv6Addrs {
    if_nbr: IfNbr,
    addrs: Vec<Ipv6AddrObj>,
    max: usize,
}

// ===== impl Ipv6AddrObj =====

impl Ipv6AddrObj {
    pub fn new(
        addr: Ipv6Addr,
        prefix_len: u8,
        mode: AddrCfgMode,
    ) -> Result<Ipv6AddrObj, Error> {
        if !Ipv6AddrExt::is_usable(&addr) {
            return Err(Error::InvalidAddrHost(addr.into()));
        }
        let network = Ipv6Network::new(addr, prefix_len)
            .map_err(|_| Error::InvalidAddrHost(addr.into()))?;

        Ok(Ipv6AddrObj {
            addr,
            network,
            mode,
            state: Ipv6AddrState::Tentative,
        })
    }

    pub fn prefix_len(&self) -> u8 {
        self.network.prefix()
    }

    pub fn is_preferred(&self) -> bool {
        self.state == Ipv6AddrState::Preferred
    }
}

// ===== impl Ipv6Addrs =====

impl Ipv6Addrs {
    pub(crate) fn new(if_nbr: IfNbr, max: usize) -> Ipv6Addrs {
        Ipv6Addrs {
            if_nbr,
            addrs: Vec::with_capacity(max),
            max,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ipv6AddrObj> + '_ {
        self.addrs.iter()
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn get(&self, addr: &Ipv6Addr) -> Option<&Ipv6AddrObj> {
        self.addrs.iter().find(|obj| obj.addr == *addr)
    }

    pub fn contains(&self, addr: &Ipv6Addr) -> bool {
        self.get(addr).is_some()
    }

    // Returns true if `addr` is configured and usable as a source.
    pub fn is_preferred(&self, addr: &Ipv6Addr) -> bool {
        self.get(addr).is_some_and(|obj| obj.is_preferred())
    }

    pub(crate) fn add(&mut self, obj: Ipv6AddrObj) -> Result<(), Error> {
        if self.contains(&obj.addr) {
            return Err(Error::AddrDuplicate(self.if_nbr, obj.addr.into()));
        }
        if self.addrs.len() >= self.max {
            return Err(Error::AddrTableFull(self.if_nbr));
        }

        Debug::AddrAdd(self.if_nbr, &obj.addr.into(), &obj.mode).log();
        self.addrs.push(obj);

        Ok(())
    }

    pub(crate) fn remove(
        &mut self,
        addr: &Ipv6Addr,
    ) -> Result<Ipv6AddrObj, Error> {
        let Some(pos) = self.addrs.iter().position(|obj| obj.addr == *addr)
        else {
            return Err(Error::AddrNotFound((*addr).into()));
        };

        let obj = self.addrs.remove(pos);
        Debug::AddrRemove(self.if_nbr, &obj.addr.into()).log();
        Ok(obj)
    }

    pub(crate) fn set_preferred(&mut self, addr: &Ipv6Addr) {
        if let Some(obj) = self.addrs.iter_mut().find(|obj| obj.addr == *addr)
        {
            obj.state = Ipv6AddrState::Preferred;
        }
    }

    // Returns true if another address maps to the same solicited-node
    // multicast group as `addr`.
    pub(crate) fn shares_solicited_node(&self, addr: &Ipv6Addr) -> bool {
        let group = addr.solicited_node();
        self.addrs
            .iter()
            .any(|obj| obj.addr != *addr && obj.addr.solicited_node() == group)
    }

    pub fn link_local(&self) -> Option<&Ipv6AddrObj> {
        self.addrs
            .iter()
            .filter(|obj| obj.is_preferred())
            .find(|obj| obj.addr.is_link_local_unicast())
    }

    /// Selects the source address to use towards `remote`: a preferred
    /// address whose prefix contains `remote`, then the link-local address
    /// for link-local destinations, then any preferred address.
    pub fn get_source_for(&self, remote: &Ipv6Addr) -> Option<Ipv6Addr> {
        let mut preferred = self.addrs.iter().filter(|obj| obj.is_preferred());
        if let Some(obj) = preferred.clone().find(|obj| {
            !obj.addr.is_link_local_unicast() && obj.network.contains(*remote)
        }) {
            return Some(obj.addr);
        }
        if remote.is_link_local_unicast() || remote.is_multicast() {
            if let Some(obj) = self.link_local() {
                return Some(obj.addr);
            }
        }
        preferred.next().map(|obj| obj.addr)
    }
}
