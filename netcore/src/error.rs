//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::buffer::BufPoolKind;
use crate::conn::ConnId;
use crate::device::NetProto;
use crate::interface::IfNbr;
use crate::packet::DecodeError;

// Network core errors.
#[derive(Debug)]
pub enum Error {
    // Resource exhaustion
    BufPoolEmpty(IfNbr, BufPoolKind),
    GroupCountExceeded(IfNbr, IpAddr),
    NbrTxQueueFull(IfNbr, Ipv6Addr),
    NbrCacheFull(IfNbr),
    AddrTableFull(IfNbr),
    ConnTableFull,
    EchoTableFull,
    RxQueueFull(IfNbr),
    // Invalid input
    InterfaceNotFound(IfNbr),
    InvalidAddrHost(IpAddr),
    InvalidSubnetMask(Ipv4Addr),
    InvalidGateway(Ipv4Addr),
    InvalidGroupAddr(IpAddr),
    AddrDuplicate(IfNbr, IpAddr),
    AddrInUse(IfNbr, IpAddr),
    AddrNotFound(IpAddr),
    AddrTableSize(usize),
    GroupNotJoined(IfNbr, IpAddr),
    InvalidBufSize(BufPoolKind, usize),
    InvalidConfig(&'static str, u64),
    InvalidState(IfNbr, &'static str),
    NoSourceAddr(IpAddr),
    ConnNotFound(ConnId),
    ConnExists(ConnId),
    PacketDecodeError(IfNbr, NetProto, DecodeError),
    // Timeout
    EchoTimeout(IpAddr),
    NbrSolicitFailed(IfNbr, Ipv6Addr),
    // Faults
    BufPoolFault(IfNbr, BufPoolKind),
    EchoDataMismatch(IpAddr),
    Fault(&'static str),
    // I/O
    IoError(IoError),
}

// Device I/O errors.
#[derive(Debug)]
pub enum IoError {
    DevOpenError(IfNbr, std::io::Error),
    DevCloseError(IfNbr, std::io::Error),
    DevStartError(IfNbr, std::io::Error),
    DevStopError(IfNbr, std::io::Error),
    DevTxError(IfNbr, std::io::Error),
    RxQueueClosed(IfNbr),
}

// Error classes reported to callers and completion hooks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ErrorKind {
    ResourceExhausted,
    InvalidInput,
    Timeout,
    Fault,
    Io,
}

// ===== impl Error =====

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BufPoolEmpty(..)
            | Error::GroupCountExceeded(..)
            | Error::NbrTxQueueFull(..)
            | Error::NbrCacheFull(..)
            | Error::AddrTableFull(..)
            | Error::ConnTableFull
            | Error::EchoTableFull
            | Error::RxQueueFull(..) => ErrorKind::ResourceExhausted,
            Error::InterfaceNotFound(..)
            | Error::InvalidAddrHost(..)
            | Error::InvalidSubnetMask(..)
            | Error::InvalidGateway(..)
            | Error::InvalidGroupAddr(..)
            | Error::AddrDuplicate(..)
            | Error::AddrInUse(..)
            | Error::AddrNotFound(..)
            | Error::AddrTableSize(..)
            | Error::GroupNotJoined(..)
            | Error::InvalidBufSize(..)
            | Error::InvalidConfig(..)
            | Error::InvalidState(..)
            | Error::NoSourceAddr(..)
            | Error::ConnNotFound(..)
            | Error::ConnExists(..)
            | Error::PacketDecodeError(..) => ErrorKind::InvalidInput,
            Error::EchoTimeout(..) | Error::NbrSolicitFailed(..) => {
                ErrorKind::Timeout
            }
            Error::BufPoolFault(..)
            | Error::EchoDataMismatch(..)
            | Error::Fault(..) => ErrorKind::Fault,
            Error::IoError(..) => ErrorKind::Io,
        }
    }

    pub fn log(&self) {
        match self {
            Error::IoError(error) => {
                error.log();
            }
            Error::BufPoolEmpty(if_nbr, kind)
            | Error::BufPoolFault(if_nbr, kind) => {
                warn!(%if_nbr, ?kind, "{}", self);
            }
            Error::GroupCountExceeded(if_nbr, addr)
            | Error::AddrDuplicate(if_nbr, addr)
            | Error::AddrInUse(if_nbr, addr)
            | Error::GroupNotJoined(if_nbr, addr) => {
                warn!(%if_nbr, address = %addr, "{}", self);
            }
            Error::NbrTxQueueFull(if_nbr, addr)
            | Error::NbrSolicitFailed(if_nbr, addr) => {
                warn!(%if_nbr, address = %addr, "{}", self);
            }
            Error::NbrCacheFull(if_nbr)
            | Error::AddrTableFull(if_nbr)
            | Error::RxQueueFull(if_nbr)
            | Error::InterfaceNotFound(if_nbr) => {
                warn!(%if_nbr, "{}", self);
            }
            Error::ConnTableFull | Error::EchoTableFull => {
                warn!("{}", self);
            }
            Error::InvalidAddrHost(addr)
            | Error::InvalidGroupAddr(addr)
            | Error::AddrNotFound(addr)
            | Error::NoSourceAddr(addr)
            | Error::EchoTimeout(addr)
            | Error::EchoDataMismatch(addr) => {
                warn!(address = %addr, "{}", self);
            }
            Error::InvalidSubnetMask(addr) | Error::InvalidGateway(addr) => {
                warn!(address = %addr, "{}", self);
            }
            Error::AddrTableSize(size) => {
                warn!(%size, "{}", self);
            }
            Error::InvalidBufSize(kind, size) => {
                warn!(?kind, %size, "{}", self);
            }
            Error::InvalidConfig(name, value) => {
                warn!(%name, %value, "{}", self);
            }
            Error::InvalidState(if_nbr, reason) => {
                warn!(%if_nbr, %reason, "{}", self);
            }
            Error::ConnNotFound(id) | Error::ConnExists(id) => {
                warn!(?id, "{}", self);
            }
            Error::PacketDecodeError(if_nbr, proto, error) => {
                warn!(%if_nbr, ?proto, %error, "{}", self);
            }
            Error::Fault(reason) => {
                error!(%reason, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(error) => error.fmt(f),
            Error::BufPoolEmpty(..) => {
                write!(f, "buffer pool exhausted")
            }
            Error::GroupCountExceeded(..) => {
                write!(f, "maximum number of host groups reached")
            }
            Error::NbrTxQueueFull(..) => {
                write!(f, "neighbor transmit queue full")
            }
            Error::NbrCacheFull(..) => {
                write!(f, "neighbor cache full")
            }
            Error::AddrTableFull(..) => {
                write!(f, "address table full")
            }
            Error::ConnTableFull => {
                write!(f, "connection table full")
            }
            Error::EchoTableFull => {
                write!(f, "too many outstanding echo requests")
            }
            Error::RxQueueFull(..) => {
                write!(f, "receive queue full, packet dropped")
            }
            Error::InterfaceNotFound(..) => {
                write!(f, "interface not found")
            }
            Error::InvalidAddrHost(..) => {
                write!(f, "invalid host address")
            }
            Error::InvalidSubnetMask(..) => {
                write!(f, "invalid subnet mask")
            }
            Error::InvalidGateway(..) => {
                write!(f, "invalid default gateway")
            }
            Error::InvalidGroupAddr(..) => {
                write!(f, "invalid multicast group address")
            }
            Error::AddrDuplicate(..) => {
                write!(f, "address already configured on this interface")
            }
            Error::AddrInUse(..) => {
                write!(f, "address configured on another interface")
            }
            Error::AddrNotFound(..) => {
                write!(f, "address not found")
            }
            Error::AddrTableSize(..) => {
                write!(f, "address table buffer too small")
            }
            Error::GroupNotJoined(..) => {
                write!(f, "multicast group not joined")
            }
            Error::InvalidBufSize(..) => {
                write!(f, "requested size exceeds the pool buffer size")
            }
            Error::InvalidConfig(..) => {
                write!(f, "configuration value out of range")
            }
            Error::InvalidState(..) => {
                write!(f, "operation not allowed in the current state")
            }
            Error::NoSourceAddr(..) => {
                write!(f, "no usable source address")
            }
            Error::ConnNotFound(..) => {
                write!(f, "connection not found")
            }
            Error::ConnExists(..) => {
                write!(f, "connection already exists")
            }
            Error::PacketDecodeError(..) => {
                write!(f, "failed to decode packet")
            }
            Error::EchoTimeout(..) => {
                write!(f, "echo request timed out")
            }
            Error::NbrSolicitFailed(..) => {
                write!(f, "neighbor solicitation failed, entry removed")
            }
            Error::BufPoolFault(..) => {
                write!(f, "buffer freed into a pool with no entries in use")
            }
            Error::EchoDataMismatch(..) => {
                write!(f, "echo reply payload differs from the request")
            }
            Error::Fault(..) => {
                write!(f, "internal fault")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(error) => Some(error),
            Error::PacketDecodeError(_, _, error) => Some(error),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

// ===== impl IoError =====

impl IoError {
    pub(crate) fn log(&self) {
        match self {
            IoError::DevOpenError(if_nbr, error)
            | IoError::DevCloseError(if_nbr, error)
            | IoError::DevStartError(if_nbr, error)
            | IoError::DevStopError(if_nbr, error)
            | IoError::DevTxError(if_nbr, error) => {
                warn!(%if_nbr, error = %with_source(error), "{}", self);
            }
            IoError::RxQueueClosed(if_nbr) => {
                error!(%if_nbr, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::DevOpenError(..) => {
                write!(f, "failed to open network device")
            }
            IoError::DevCloseError(..) => {
                write!(f, "failed to close network device")
            }
            IoError::DevStartError(..) => {
                write!(f, "failed to start network device")
            }
            IoError::DevStopError(..) => {
                write!(f, "failed to stop network device")
            }
            IoError::DevTxError(..) => {
                write!(f, "failed to transmit packet")
            }
            IoError::RxQueueClosed(..) => {
                write!(f, "receive queue closed")
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::DevOpenError(_, error)
            | IoError::DevCloseError(_, error)
            | IoError::DevStartError(_, error)
            | IoError::DevStopError(_, error)
            | IoError::DevTxError(_, error) => Some(error),
            IoError::RxQueueClosed(..) => None,
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
