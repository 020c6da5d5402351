//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use netcore_utils::Responder;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::debug::Debug;
use crate::error::Error;
use crate::packet::{
    DecodeError, DecodeResult, update_cksum, update_icmpv6_cksum,
    verify_cksum, verify_icmpv6_cksum,
};

// ICMPv4 message types handled by the stack.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Icmpv4Type {
    EchoReply = 0,
    EchoRequest = 8,
}

// ICMPv6 message types handled by the stack.
//
// IANA registry:
// https://www.iana.org/assignments/icmpv6-parameters/icmpv6-parameters.xhtml
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Icmpv6Type {
    EchoRequest = 128,
    EchoReply = 129,
    MldQuery = 130,
    MldReport = 131,
    MldDone = 132,
    RouterSolicit = 133,
    RouterAdvert = 134,
    NeighborSolicit = 135,
    NeighborAdvert = 136,
    Redirect = 137,
}

// ICMP echo message (RFC 792, RFC 4443 section 4).
//
// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |     Code      |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           Identifier          |        Sequence Number        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Data ...
// +-+-+-+-+-
//
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct EchoPacket {
    pub request: bool,
    pub id: u16,
    pub seq: u16,
    pub data: Bytes,
}

/// Table of outstanding echo requests.
///
/// Shared between the stack worker, which matches incoming replies, and
/// the callers waiting on an [`EchoHandle`].
#[derive(Debug)]
pub struct EchoService {
    table: Mutex<EchoTable>,
}

#[derive(Debug)]
struct EchoTable {
    reqs: HashMap<EchoKey, EchoReq>,
    id: u16,
    next_seq: u16,
    max: usize,
}

type EchoKey = (u16, u16);

#[derive(Debug)]
struct EchoReq {
    dest: IpAddr,
    data: Bytes,
    replyp: Responder<Result<(), Error>>,
}

/// Pending echo request, returned when the request is sent.
///
/// Dropping the handle forgets the request; a reply arriving afterwards is
/// discarded.
#[derive(Debug)]
pub struct EchoHandle {
    service: Arc<EchoService>,
    key: EchoKey,
    dest: IpAddr,
    sent: Instant,
    deadline: Instant,
    replyc: Option<oneshot::Receiver<Result<(), Error>>>,
}

// ===== impl EchoPacket =====

impl EchoPacket {
    const HDR_LENGTH: usize = 8;

    pub fn request(id: u16, seq: u16, data: Bytes) -> EchoPacket {
        EchoPacket {
            request: true,
            id,
            seq,
            data,
        }
    }

    // Reply mirroring a received request.
    pub fn reply(&self) -> EchoPacket {
        EchoPacket {
            request: false,
            id: self.id,
            seq: self.seq,
            data: self.data.clone(),
        }
    }

    pub fn length(&self) -> usize {
        Self::HDR_LENGTH + self.data.len()
    }

    pub fn decode_v4(buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.len() < Self::HDR_LENGTH {
            return Err(DecodeError::InsufficientData);
        }
        verify_cksum(&buf[..])?;

        let pkt_type = buf.get_u8();
        let request = match Icmpv4Type::from_u8(pkt_type) {
            Some(Icmpv4Type::EchoRequest) => true,
            Some(Icmpv4Type::EchoReply) => false,
            None => return Err(DecodeError::UnknownPacketType(pkt_type)),
        };
        Self::decode_body(request, buf)
    }

    pub fn decode_v6(
        src: &Ipv6Addr,
        dst: &Ipv6Addr,
        buf: &mut Bytes,
    ) -> DecodeResult<Self> {
        if buf.len() < Self::HDR_LENGTH {
            return Err(DecodeError::InsufficientData);
        }
        verify_icmpv6_cksum(src, dst, &buf[..])?;

        let pkt_type = buf.get_u8();
        let request = match Icmpv6Type::from_u8(pkt_type) {
            Some(Icmpv6Type::EchoRequest) => true,
            Some(Icmpv6Type::EchoReply) => false,
            _ => return Err(DecodeError::UnknownPacketType(pkt_type)),
        };
        Self::decode_body(request, buf)
    }

    fn decode_body(request: bool, buf: &mut Bytes) -> DecodeResult<Self> {
        let code = buf.get_u8();
        if code != 0 {
            return Err(DecodeError::InvalidCode(code));
        }
        let _cksum = buf.get_u16();
        let id = buf.get_u16();
        let seq = buf.get_u16();
        let data = buf.copy_to_bytes(buf.remaining());

        Ok(EchoPacket {
            request,
            id,
            seq,
            data,
        })
    }

    pub fn encode_v4(&self) -> Bytes {
        let pkt_type = match self.request {
            true => Icmpv4Type::EchoRequest as u8,
            false => Icmpv4Type::EchoReply as u8,
        };
        let mut buf = self.encode_body(pkt_type);
        update_cksum(&mut buf);
        buf.freeze()
    }

    pub fn encode_v6(&self, src: &Ipv6Addr, dst: &Ipv6Addr) -> Bytes {
        let pkt_type = match self.request {
            true => Icmpv6Type::EchoRequest as u8,
            false => Icmpv6Type::EchoReply as u8,
        };
        let mut buf = self.encode_body(pkt_type);
        update_icmpv6_cksum(src, dst, &mut buf);
        buf.freeze()
    }

    fn encode_body(&self, pkt_type: u8) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.length());
        buf.put_u8(pkt_type);
        buf.put_u8(0);
        // The checksum will be rewritten later.
        buf.put_u16(0);
        buf.put_u16(self.id);
        buf.put_u16(self.seq);
        buf.put_slice(&self.data);
        buf
    }
}

// ===== impl EchoService =====

impl EchoService {
    pub(crate) fn new(id: u16, max: usize) -> Arc<EchoService> {
        Arc::new(EchoService {
            table: Mutex::new(EchoTable {
                reqs: Default::default(),
                id,
                next_seq: 0,
                max,
            }),
        })
    }

    // Number of requests waiting for a reply.
    pub fn outstanding(&self) -> usize {
        self.table.lock().unwrap().reqs.len()
    }

    // Records a new request and returns the handle used to wait for it.
    pub(crate) fn register(
        self: &Arc<Self>,
        dest: IpAddr,
        data: Bytes,
        timeout: Duration,
    ) -> Result<EchoHandle, Error> {
        let mut table = self.table.lock().unwrap();
        if table.reqs.len() >= table.max {
            return Err(Error::EchoTableFull);
        }

        // Skip sequence numbers still in use after a wrap-around.
        let id = table.id;
        let mut seq = table.next_seq;
        while table.reqs.contains_key(&(id, seq)) {
            seq = seq.wrapping_add(1);
        }
        table.next_seq = seq.wrapping_add(1);

        let (replyp, replyc) = oneshot::channel();
        table.reqs.insert((id, seq), EchoReq { dest, data, replyp });
        Debug::EchoReqTx(&dest, id, seq).log();

        let sent = Instant::now();
        Ok(EchoHandle {
            service: self.clone(),
            key: (id, seq),
            dest,
            sent,
            deadline: sent + timeout,
            replyc: Some(replyc),
        })
    }

    fn cancel(&self, key: EchoKey) -> bool {
        self.table.lock().unwrap().reqs.remove(&key).is_some()
    }

    /// Matches an echo reply against the outstanding requests.
    ///
    /// Returns false when no request matches, in which case the reply is
    /// discarded.
    pub(crate) fn process_reply(
        &self,
        src: IpAddr,
        reply: &EchoPacket,
    ) -> bool {
        let mut table = self.table.lock().unwrap();
        let key = (reply.id, reply.seq);
        match table.reqs.get(&key) {
            Some(req) if req.dest == src || req.dest.is_multicast() => (),
            _ => {
                Debug::EchoReplyStray(&src, reply.id, reply.seq).log();
                return false;
            }
        }
        let Some(req) = table.reqs.remove(&key) else {
            return false;
        };
        drop(table);

        Debug::EchoReplyRx(&src, reply.id, reply.seq).log();
        let result = match req.data == reply.data {
            true => Ok(()),
            false => Err(Error::EchoDataMismatch(src)),
        };
        let _ = req.replyp.send(result);
        true
    }
}

// ===== impl EchoHandle =====

impl EchoHandle {
    pub fn id(&self) -> u16 {
        self.key.0
    }

    pub fn seq(&self) -> u16 {
        self.key.1
    }

    pub fn dest(&self) -> IpAddr {
        self.dest
    }

    /// Waits for the matching reply and returns the round-trip time.
    ///
    /// Fails with `EchoTimeout` once the deadline passes, and with
    /// `EchoDataMismatch` if the reply payload differs from the request.
    pub async fn wait(mut self) -> Result<Duration, Error> {
        let Some(replyc) = self.replyc.take() else {
            return Err(Error::Fault("echo handle already consumed"));
        };

        match tokio::time::timeout_at(self.deadline, replyc).await {
            Ok(Ok(result)) => result.map(|_| self.sent.elapsed()),
            Ok(Err(_)) => Err(Error::Fault("echo request record dropped")),
            Err(_) => {
                self.service.cancel(self.key);
                Debug::EchoReqTimeout(&self.dest, self.key.0, self.key.1)
                    .log();
                Err(Error::EchoTimeout(self.dest))
            }
        }
    }
}

impl Drop for EchoHandle {
    fn drop(&mut self) {
        self.service.cancel(self.key);
    }
}
