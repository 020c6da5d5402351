//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use bytes::BytesMut;
use internet_checksum::Checksum;
use serde::{Deserialize, Serialize};

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;

// IPv6 next header value for ICMPv6.
pub const IPPROTO_ICMPV6: u8 = 58;

// Checksum field offset shared by IGMP and ICMP messages.
pub(crate) const CKSUM_RANGE: std::ops::Range<usize> = 2..4;

// Decode errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DecodeError {
    InsufficientData,
    InvalidChecksum,
    InvalidLength(usize),
    UnknownPacketType(u8),
    InvalidCode(u8),
    InvalidHardwareType(u16),
    InvalidProtocolType(u16),
    InvalidOperation(u16),
    InvalidMagicCookie(u32),
    InvalidOption(u8),
    MissingOption(u8),
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InsufficientData => {
                write!(f, "not enough data")
            }
            DecodeError::InvalidChecksum => {
                write!(f, "invalid checksum")
            }
            DecodeError::InvalidLength(len) => {
                write!(f, "invalid length: {len}")
            }
            DecodeError::UnknownPacketType(pkt_type) => {
                write!(f, "unknown packet type: {pkt_type}")
            }
            DecodeError::InvalidCode(code) => {
                write!(f, "invalid code: {code}")
            }
            DecodeError::InvalidHardwareType(htype) => {
                write!(f, "invalid hardware type: {htype}")
            }
            DecodeError::InvalidProtocolType(ptype) => {
                write!(f, "invalid protocol type: {ptype:#06x}")
            }
            DecodeError::InvalidOperation(op) => {
                write!(f, "invalid operation: {op}")
            }
            DecodeError::InvalidMagicCookie(cookie) => {
                write!(f, "invalid magic cookie: {cookie:#010x}")
            }
            DecodeError::InvalidOption(code) => {
                write!(f, "malformed option: {code}")
            }
            DecodeError::MissingOption(code) => {
                write!(f, "missing mandatory option: {code}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

// ===== global functions =====

// Computes the Internet checksum of `buf` and stores it in the checksum field.
pub(crate) fn update_cksum(buf: &mut BytesMut) {
    let mut cksum = Checksum::new();
    cksum.add_bytes(buf);
    buf[CKSUM_RANGE].copy_from_slice(&cksum.checksum());
}

pub(crate) fn verify_cksum(data: &[u8]) -> DecodeResult<()> {
    let mut cksum = Checksum::new();
    cksum.add_bytes(data);
    if cksum.checksum() != [0, 0] {
        return Err(DecodeError::InvalidChecksum);
    }
    Ok(())
}

// ICMPv6 checksums cover an IPv6 pseudo-header (RFC 8200, section 8.1).
fn icmpv6_cksum(src: &Ipv6Addr, dst: &Ipv6Addr, data: &[u8]) -> Checksum {
    let mut cksum = Checksum::new();
    cksum.add_bytes(&src.octets());
    cksum.add_bytes(&dst.octets());
    cksum.add_bytes(&(data.len() as u32).to_be_bytes());
    cksum.add_bytes(&[0, 0, 0, IPPROTO_ICMPV6]);
    cksum.add_bytes(data);
    cksum
}

pub(crate) fn update_icmpv6_cksum(
    src: &Ipv6Addr,
    dst: &Ipv6Addr,
    buf: &mut BytesMut,
) {
    let cksum = icmpv6_cksum(src, dst, buf);
    buf[CKSUM_RANGE].copy_from_slice(&cksum.checksum());
}

pub(crate) fn verify_icmpv6_cksum(
    src: &Ipv6Addr,
    dst: &Ipv6Addr,
    data: &[u8],
) -> DecodeResult<()> {
    if icmpv6_cksum(src, dst, data).checksum() != [0, 0] {
        return Err(DecodeError::InvalidChecksum);
    }
    Ok(())
}
