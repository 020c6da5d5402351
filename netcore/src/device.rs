//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use netcore_utils::Sender;
use netcore_utils::mac_addr::MacAddr;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;

use crate::buffer::{BufPoolKind, BufPools, NetBuf};
use crate::error::{Error, IoError};
use crate::interface::IfNbr;

// Network device classes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DevKind {
    Ether,
    Wifi,
    Loopback,
}

// Upper-layer protocol carried by a packet crossing the device boundary.
//
// IP and link-layer headers are built and stripped below this boundary; the
// stack only handles the protocol payload plus its addressing metadata.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum NetProto {
    Arp,
    Igmp,
    Icmpv4,
    Icmpv6,
    Udp { src_port: u16, dst_port: u16 },
}

// Outgoing packet handed to a device driver.
//
// The driver owns the buffer from this point on and releases it (by dropping
// it) once transmission completes.
#[derive(Debug)]
pub struct NetTxPacket {
    pub if_nbr: IfNbr,
    pub proto: NetProto,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub dst_mac: Option<MacAddr>,
    pub buf: NetBuf,
}

// Incoming packet handed from a device driver to the stack worker.
#[derive(Debug)]
pub struct NetRxPacketMsg {
    pub if_nbr: IfNbr,
    pub proto: NetProto,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub src_mac: Option<MacAddr>,
    pub buf: NetBuf,
}

/// Device driver capability set.
///
/// Methods are called from the stack worker context. Received packets flow
/// the other way through the [`RxHandoff`] given to [`NetDevApi::open`].
pub trait NetDevApi: Send + std::fmt::Debug {
    fn open(&mut self, rx: RxHandoff) -> std::io::Result<()>;

    fn close(&mut self) -> std::io::Result<()>;

    fn start(&mut self) -> std::io::Result<()>;

    fn stop(&mut self) -> std::io::Result<()>;

    fn tx(&mut self, packet: NetTxPacket) -> std::io::Result<()>;
}

/// Receive path handle given to a driver when its device is opened.
///
/// Safe to use from interrupt-like contexts: allocation only takes the pool
/// lock and posting never blocks.
#[derive(Clone, Debug)]
pub struct RxHandoff {
    if_nbr: IfNbr,
    bufs: BufPools,
    net_rxp: Sender<NetRxPacketMsg>,
}

// ===== impl RxHandoff =====

impl RxHandoff {
    pub(crate) fn new(
        if_nbr: IfNbr,
        bufs: BufPools,
        net_rxp: Sender<NetRxPacketMsg>,
    ) -> RxHandoff {
        RxHandoff {
            if_nbr,
            bufs,
            net_rxp,
        }
    }

    pub fn if_nbr(&self) -> IfNbr {
        self.if_nbr
    }

    /// Draws a buffer from the interface receive pool.
    pub fn alloc_rx(&self, size: usize) -> Result<NetBuf, Error> {
        self.bufs.alloc(BufPoolKind::RxLarge, size)
    }

    /// Hands a received packet over to the stack worker.
    ///
    /// When the queue is full the packet is dropped, its buffer returns to
    /// the pool and `RxQueueFull` is returned.
    pub fn post(
        &self,
        proto: NetProto,
        src: IpAddr,
        dst: IpAddr,
        src_mac: Option<MacAddr>,
        buf: NetBuf,
    ) -> Result<(), Error> {
        let msg = NetRxPacketMsg {
            if_nbr: self.if_nbr,
            proto,
            src,
            dst,
            src_mac,
            buf,
        };
        self.net_rxp.try_send(msg).map_err(|error| match error {
            TrySendError::Full(_) => Error::RxQueueFull(self.if_nbr),
            TrySendError::Closed(_) => {
                Error::IoError(IoError::RxQueueClosed(self.if_nbr))
            }
        })
    }
}
