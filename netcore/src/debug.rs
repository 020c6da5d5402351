//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use tracing::{debug, debug_span};

use crate::config::NdpSolicitKind;
use crate::conn::{Conn, ConnId};
use crate::device::{NetRxPacketMsg, NetTxPacket};
use crate::dhcp::DhcpState;
use crate::dhcp::packet::{DhcpPacket, MessageType};
use crate::hook::AddrCfgOutcome;
use crate::interface::IfNbr;
use crate::ipv4::AddrCfgMode;
use crate::mcast::group::GroupState;
use crate::ndp::neighbor::{NbrRemoveReason, NbrState};

// Network core debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Interfaces
    InterfaceCreate(IfNbr, &'a str),
    InterfaceStart(IfNbr),
    InterfaceStop(IfNbr),
    // Network
    PacketRx(&'a NetRxPacketMsg),
    PacketTx(&'a NetTxPacket),
    PacketIgnored(IfNbr, &'a IpAddr, &'static str),
    // Addresses
    AddrAdd(IfNbr, &'a IpAddr, &'a AddrCfgMode),
    AddrRemove(IfNbr, &'a IpAddr),
    HookInvoke(&'a AddrCfgOutcome),
    // Multicast
    GroupJoin(IfNbr, &'a IpAddr),
    GroupLeave(IfNbr, &'a IpAddr),
    GroupStateChange(IfNbr, &'a IpAddr, &'a GroupState, &'a GroupState),
    GroupReportTimerStart(IfNbr, &'a IpAddr, Duration),
    // Neighbor discovery
    NbrCreate(IfNbr, &'a Ipv6Addr),
    NbrRemove(IfNbr, &'a Ipv6Addr, NbrRemoveReason),
    NbrStateChange(IfNbr, &'a Ipv6Addr, &'a NbrState, &'a NbrState),
    NbrSolicitTx(IfNbr, &'a Ipv6Addr, NdpSolicitKind),
    DadStart(IfNbr, &'a Ipv6Addr),
    DadSuccess(IfNbr, &'a Ipv6Addr),
    DadConflict(IfNbr, &'a Ipv6Addr),
    // ICMP echo
    EchoReqTx(&'a IpAddr, u16, u16),
    EchoReqRx(IfNbr, &'a IpAddr, u16, u16),
    EchoReplyRx(&'a IpAddr, u16, u16),
    EchoReplyStray(&'a IpAddr, u16, u16),
    EchoReqTimeout(&'a IpAddr, u16, u16),
    // Connections
    ConnAlloc(ConnId, &'a Conn),
    ConnFree(ConnId),
    ConnAccessThreshold(ConnId, u16),
    // DHCP
    DhcpStateChange(IfNbr, &'a DhcpState, &'a DhcpState),
    DhcpMsgTx(IfNbr, &'a MessageType),
    DhcpMsgRx(IfNbr, &'a DhcpPacket),
    // IPv4 link-local
    AutoIpProbe(IfNbr, &'a Ipv4Addr),
    AutoIpClaim(IfNbr, &'a Ipv4Addr),
    AutoIpConflict(IfNbr, &'a Ipv4Addr, u8),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InterfaceCreate(if_nbr, name) => {
                debug!(%if_nbr, %name, "{}", self);
            }
            Debug::InterfaceStart(if_nbr) | Debug::InterfaceStop(if_nbr) => {
                debug!(%if_nbr, "{}", self);
            }
            Debug::PacketRx(packet) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        let proto =
                            serde_json::to_string(&packet.proto).unwrap();
                        debug!(
                            if_nbr = %packet.if_nbr,
                            src = %packet.src,
                            dst = %packet.dst,
                            %proto,
                            len = %packet.buf.len(),
                            "{}", self
                        );
                    })
                })
            }
            Debug::PacketTx(packet) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("output").in_scope(|| {
                        let proto =
                            serde_json::to_string(&packet.proto).unwrap();
                        debug!(
                            if_nbr = %packet.if_nbr,
                            src = %packet.src,
                            dst = %packet.dst,
                            %proto,
                            len = %packet.buf.len(),
                            "{}", self
                        );
                    })
                })
            }
            Debug::PacketIgnored(if_nbr, src, reason) => {
                debug!(%if_nbr, %src, %reason, "{}", self);
            }
            Debug::AddrAdd(if_nbr, addr, mode) => {
                debug!(%if_nbr, %addr, ?mode, "{}", self);
            }
            Debug::AddrRemove(if_nbr, addr) => {
                debug!(%if_nbr, %addr, "{}", self);
            }
            Debug::HookInvoke(outcome) => {
                let data = serde_json::to_string(&outcome).unwrap();
                debug!(%data, "{}", self);
            }
            Debug::GroupJoin(if_nbr, group)
            | Debug::GroupLeave(if_nbr, group) => {
                debug_span!("mcast").in_scope(|| {
                    debug!(%if_nbr, %group, "{}", self);
                })
            }
            Debug::GroupStateChange(if_nbr, group, old_state, new_state) => {
                debug_span!("mcast").in_scope(|| {
                    debug!(%if_nbr, %group, ?old_state, ?new_state, "{}", self);
                })
            }
            Debug::GroupReportTimerStart(if_nbr, group, delay) => {
                debug_span!("mcast").in_scope(|| {
                    debug!(%if_nbr, %group, ?delay, "{}", self);
                })
            }
            Debug::NbrCreate(if_nbr, addr) => {
                debug_span!("ndp").in_scope(|| {
                    debug!(%if_nbr, %addr, "{}", self);
                })
            }
            Debug::NbrRemove(if_nbr, addr, reason) => {
                debug_span!("ndp").in_scope(|| {
                    debug!(%if_nbr, %addr, ?reason, "{}", self);
                })
            }
            Debug::NbrStateChange(if_nbr, addr, old_state, new_state) => {
                debug_span!("ndp").in_scope(|| {
                    debug!(%if_nbr, %addr, ?old_state, ?new_state, "{}", self);
                })
            }
            Debug::NbrSolicitTx(if_nbr, addr, kind) => {
                debug_span!("ndp").in_scope(|| {
                    debug!(%if_nbr, %addr, ?kind, "{}", self);
                })
            }
            Debug::DadStart(if_nbr, addr)
            | Debug::DadSuccess(if_nbr, addr)
            | Debug::DadConflict(if_nbr, addr) => {
                debug_span!("ndp").in_scope(|| {
                    debug_span!("dad").in_scope(|| {
                        debug!(%if_nbr, %addr, "{}", self);
                    })
                })
            }
            Debug::EchoReqTx(addr, id, seq)
            | Debug::EchoReplyRx(addr, id, seq)
            | Debug::EchoReplyStray(addr, id, seq)
            | Debug::EchoReqTimeout(addr, id, seq) => {
                debug_span!("echo").in_scope(|| {
                    debug!(%addr, %id, %seq, "{}", self);
                })
            }
            Debug::EchoReqRx(if_nbr, addr, id, seq) => {
                debug_span!("echo").in_scope(|| {
                    debug!(%if_nbr, %addr, %id, %seq, "{}", self);
                })
            }
            Debug::ConnAlloc(id, conn) => {
                debug!(
                    ?id,
                    proto = ?conn.proto,
                    local = %conn.local,
                    remote = ?conn.remote,
                    "{}", self
                );
            }
            Debug::ConnFree(id) => {
                debug!(?id, "{}", self);
            }
            Debug::ConnAccessThreshold(id, threshold) => {
                debug!(?id, %threshold, "{}", self);
            }
            Debug::DhcpStateChange(if_nbr, old_state, new_state) => {
                debug_span!("dhcp").in_scope(|| {
                    debug!(%if_nbr, ?old_state, ?new_state, "{}", self);
                })
            }
            Debug::DhcpMsgTx(if_nbr, msg_type) => {
                debug_span!("dhcp").in_scope(|| {
                    debug!(%if_nbr, ?msg_type, "{}", self);
                })
            }
            Debug::DhcpMsgRx(if_nbr, packet) => {
                debug_span!("dhcp").in_scope(|| {
                    let data = serde_json::to_string(&packet).unwrap();
                    debug!(%if_nbr, %data, "{}", self);
                })
            }
            Debug::AutoIpProbe(if_nbr, addr)
            | Debug::AutoIpClaim(if_nbr, addr) => {
                debug_span!("autoip").in_scope(|| {
                    debug!(%if_nbr, %addr, "{}", self);
                })
            }
            Debug::AutoIpConflict(if_nbr, addr, conflicts) => {
                debug_span!("autoip").in_scope(|| {
                    debug!(%if_nbr, %addr, %conflicts, "{}", self);
                })
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InterfaceCreate(..) => {
                write!(f, "interface created")
            }
            Debug::InterfaceStart(..) => {
                write!(f, "starting interface")
            }
            Debug::InterfaceStop(..) => {
                write!(f, "stopping interface")
            }
            Debug::PacketRx(..) | Debug::PacketTx(..) => {
                write!(f, "packet")
            }
            Debug::PacketIgnored(..) => {
                write!(f, "packet ignored")
            }
            Debug::AddrAdd(..) => {
                write!(f, "address added")
            }
            Debug::AddrRemove(..) => {
                write!(f, "address removed")
            }
            Debug::HookInvoke(..) => {
                write!(f, "address configuration completed")
            }
            Debug::GroupJoin(..) => {
                write!(f, "group joined")
            }
            Debug::GroupLeave(..) => {
                write!(f, "group left")
            }
            Debug::GroupStateChange(..) => {
                write!(f, "group state change")
            }
            Debug::GroupReportTimerStart(..) => {
                write!(f, "report timer started")
            }
            Debug::NbrCreate(..) => {
                write!(f, "neighbor created")
            }
            Debug::NbrRemove(..) => {
                write!(f, "neighbor removed")
            }
            Debug::NbrStateChange(..) => {
                write!(f, "neighbor state change")
            }
            Debug::NbrSolicitTx(..) => {
                write!(f, "neighbor solicitation sent")
            }
            Debug::DadStart(..) => {
                write!(f, "duplicate address detection started")
            }
            Debug::DadSuccess(..) => {
                write!(f, "address is unique")
            }
            Debug::DadConflict(..) => {
                write!(f, "duplicate address detected")
            }
            Debug::EchoReqTx(..) => {
                write!(f, "echo request sent")
            }
            Debug::EchoReqRx(..) => {
                write!(f, "echo request received")
            }
            Debug::EchoReplyRx(..) => {
                write!(f, "echo reply received")
            }
            Debug::EchoReplyStray(..) => {
                write!(f, "unmatched echo reply discarded")
            }
            Debug::EchoReqTimeout(..) => {
                write!(f, "echo request timed out")
            }
            Debug::ConnAlloc(..) => {
                write!(f, "connection allocated")
            }
            Debug::ConnFree(..) => {
                write!(f, "connection freed")
            }
            Debug::ConnAccessThreshold(..) => {
                write!(f, "connection moved to the head of the list")
            }
            Debug::DhcpStateChange(..) => {
                write!(f, "state change")
            }
            Debug::DhcpMsgTx(..) => {
                write!(f, "message sent")
            }
            Debug::DhcpMsgRx(..) => {
                write!(f, "message received")
            }
            Debug::AutoIpProbe(..) => {
                write!(f, "probing candidate address")
            }
            Debug::AutoIpClaim(..) => {
                write!(f, "candidate address claimed")
            }
            Debug::AutoIpConflict(..) => {
                write!(f, "address conflict")
            }
        }
    }
}
