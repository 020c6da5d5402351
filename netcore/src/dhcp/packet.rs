//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use netcore_utils::bytes::{BytesExt, BytesMutExt};
use netcore_utils::mac_addr::MacAddr;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::packet::{DecodeError, DecodeResult};

const OP_BOOTREQUEST: u8 = 1;
const OP_BOOTREPLY: u8 = 2;
const HTYPE_ETHERNET: u8 = 1;
const MAGIC_COOKIE: u32 = 0x6382_5363;
const FLAG_BROADCAST: u16 = 0x8000;
// Fixed BOOTP header plus the magic cookie.
const HDR_LENGTH: usize = 240;
// Minimum BOOTP message size (RFC 1542, section 3.1.1).
const MIN_LENGTH: usize = 300;

// DHCP message (RFC 2131, section 2).
//
// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +---------------+---------------+---------------+---------------+
// |     op (1)    |   htype (1)   |   hlen (1)    |   hops (1)    |
// +---------------+---------------+---------------+---------------+
// |                            xid (4)                            |
// +-------------------------------+-------------------------------+
// |           secs (2)            |           flags (2)           |
// +-------------------------------+-------------------------------+
// |                          ciaddr  (4)                          |
// +---------------------------------------------------------------+
// |                          yiaddr  (4)                          |
// +---------------------------------------------------------------+
// |                          siaddr  (4)                          |
// +---------------------------------------------------------------+
// |                          giaddr  (4)                          |
// +---------------------------------------------------------------+
// |                          chaddr  (16)                         |
// +---------------------------------------------------------------+
// |                          sname   (64)                         |
// +---------------------------------------------------------------+
// |                          file    (128)                        |
// +---------------------------------------------------------------+
// |                          options (variable)                   |
// +---------------------------------------------------------------+
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DhcpPacket {
    pub reply: bool,
    pub xid: u32,
    pub secs: u16,
    pub broadcast: bool,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: MacAddr,
    pub msg_type: MessageType,
    pub options: DhcpOptions,
}

// Options understood by the client (RFC 2132).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DhcpOptions {
    pub subnet_mask: Option<Ipv4Addr>,
    pub router: Option<Ipv4Addr>,
    pub requested_addr: Option<Ipv4Addr>,
    pub lease_time: Option<u32>,
    pub server_id: Option<Ipv4Addr>,
    pub param_req_list: Option<Vec<u8>>,
    pub renewal_time: Option<u32>,
    pub rebinding_time: Option<u32>,
}

#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
pub enum OptionCode {
    Pad = 0,
    SubnetMask = 1,
    Router = 3,
    RequestedAddr = 50,
    LeaseTime = 51,
    MessageType = 53,
    ServerId = 54,
    ParamReqList = 55,
    RenewalTime = 58,
    RebindingTime = 59,
    End = 255,
}

// ===== impl DhcpPacket =====

impl DhcpPacket {
    // Client message with every address field cleared.
    pub fn client(msg_type: MessageType, xid: u32, chaddr: MacAddr) -> Self {
        DhcpPacket {
            reply: false,
            xid,
            secs: 0,
            broadcast: false,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr,
            msg_type,
            options: Default::default(),
        }
    }

    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.len() < HDR_LENGTH {
            return Err(DecodeError::InsufficientData);
        }

        let op = buf.get_u8();
        let reply = match op {
            OP_BOOTREQUEST => false,
            OP_BOOTREPLY => true,
            _ => return Err(DecodeError::InvalidOperation(op.into())),
        };
        let htype = buf.get_u8();
        if htype != HTYPE_ETHERNET {
            return Err(DecodeError::InvalidHardwareType(htype.into()));
        }
        let hlen = buf.get_u8();
        if hlen as usize != MacAddr::LENGTH {
            return Err(DecodeError::InvalidLength(hlen as usize));
        }
        let _hops = buf.get_u8();
        let xid = buf.get_u32();
        let secs = buf.get_u16();
        let flags = buf.get_u16();
        let ciaddr = buf.get_ipv4();
        let yiaddr = buf.get_ipv4();
        let siaddr = buf.get_ipv4();
        let giaddr = buf.get_ipv4();
        let mut chaddr_buf = buf.split_to(16);
        let chaddr = chaddr_buf.get_mac();
        // Skip sname and file.
        buf.advance(64 + 128);
        let cookie = buf.get_u32();
        if cookie != MAGIC_COOKIE {
            return Err(DecodeError::InvalidMagicCookie(cookie));
        }

        let (msg_type, options) = decode_options(buf)?;

        Ok(DhcpPacket {
            reply,
            xid,
            secs,
            broadcast: flags & FLAG_BROADCAST != 0,
            ciaddr,
            yiaddr,
            siaddr,
            giaddr,
            chaddr,
            msg_type,
            options,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MIN_LENGTH + 64);

        buf.put_u8(match self.reply {
            true => OP_BOOTREPLY,
            false => OP_BOOTREQUEST,
        });
        buf.put_u8(HTYPE_ETHERNET);
        buf.put_u8(MacAddr::LENGTH as u8);
        buf.put_u8(0);
        buf.put_u32(self.xid);
        buf.put_u16(self.secs);
        buf.put_u16(match self.broadcast {
            true => FLAG_BROADCAST,
            false => 0,
        });
        buf.put_ipv4(&self.ciaddr);
        buf.put_ipv4(&self.yiaddr);
        buf.put_ipv4(&self.siaddr);
        buf.put_ipv4(&self.giaddr);
        buf.put_mac(&self.chaddr);
        buf.put_bytes(0, 16 - MacAddr::LENGTH);
        buf.put_bytes(0, 64 + 128);
        buf.put_u32(MAGIC_COOKIE);

        let opts = &self.options;
        buf.put_u8(OptionCode::MessageType as u8);
        buf.put_u8(1);
        buf.put_u8(self.msg_type as u8);
        for (code, addr) in [
            (OptionCode::SubnetMask, opts.subnet_mask),
            (OptionCode::Router, opts.router),
            (OptionCode::RequestedAddr, opts.requested_addr),
            (OptionCode::ServerId, opts.server_id),
        ] {
            if let Some(addr) = addr {
                buf.put_u8(code as u8);
                buf.put_u8(4);
                buf.put_ipv4(&addr);
            }
        }
        for (code, secs) in [
            (OptionCode::LeaseTime, opts.lease_time),
            (OptionCode::RenewalTime, opts.renewal_time),
            (OptionCode::RebindingTime, opts.rebinding_time),
        ] {
            if let Some(secs) = secs {
                buf.put_u8(code as u8);
                buf.put_u8(4);
                buf.put_u32(secs);
            }
        }
        if let Some(params) = &opts.param_req_list {
            buf.put_u8(OptionCode::ParamReqList as u8);
            buf.put_u8(params.len() as u8);
            buf.put_slice(params);
        }
        buf.put_u8(OptionCode::End as u8);
        if buf.len() < MIN_LENGTH {
            buf.put_bytes(0, MIN_LENGTH - buf.len());
        }

        buf.freeze()
    }
}

// ===== helper functions =====

fn decode_options(buf: &mut Bytes) -> DecodeResult<(MessageType, DhcpOptions)> {
    let mut msg_type = None;
    let mut options = DhcpOptions::default();

    while buf.has_remaining() {
        let code = buf.get_u8();
        match OptionCode::from_u8(code) {
            Some(OptionCode::Pad) => continue,
            Some(OptionCode::End) => break,
            _ => (),
        }
        if !buf.has_remaining() {
            return Err(DecodeError::InvalidOption(code));
        }
        let len = buf.get_u8() as usize;
        if len > buf.remaining() {
            return Err(DecodeError::InvalidOption(code));
        }
        let mut value = buf.split_to(len);

        match OptionCode::from_u8(code) {
            Some(OptionCode::MessageType) => {
                if len != 1 {
                    return Err(DecodeError::InvalidOption(code));
                }
                let value = value.get_u8();
                msg_type = Some(
                    MessageType::from_u8(value)
                        .ok_or(DecodeError::InvalidOption(code))?,
                );
            }
            Some(
                OptionCode::SubnetMask
                | OptionCode::Router
                | OptionCode::RequestedAddr
                | OptionCode::ServerId,
            ) => {
                // Only the first router of a list is kept.
                if len < 4 || len % 4 != 0 {
                    return Err(DecodeError::InvalidOption(code));
                }
                let addr = Some(value.get_ipv4());
                match OptionCode::from_u8(code) {
                    Some(OptionCode::SubnetMask) => options.subnet_mask = addr,
                    Some(OptionCode::Router) => options.router = addr,
                    Some(OptionCode::RequestedAddr) => {
                        options.requested_addr = addr
                    }
                    _ => options.server_id = addr,
                }
            }
            Some(
                OptionCode::LeaseTime
                | OptionCode::RenewalTime
                | OptionCode::RebindingTime,
            ) => {
                if len != 4 {
                    return Err(DecodeError::InvalidOption(code));
                }
                let secs = Some(value.get_u32());
                match OptionCode::from_u8(code) {
                    Some(OptionCode::LeaseTime) => options.lease_time = secs,
                    Some(OptionCode::RenewalTime) => {
                        options.renewal_time = secs
                    }
                    _ => options.rebinding_time = secs,
                }
            }
            Some(OptionCode::ParamReqList) => {
                options.param_req_list = Some(value.to_vec());
            }
            // Unknown options are skipped.
            _ => (),
        }
    }

    let msg_type = msg_type.ok_or(DecodeError::MissingOption(
        OptionCode::MessageType as u8,
    ))?;
    Ok((msg_type, options))
}
