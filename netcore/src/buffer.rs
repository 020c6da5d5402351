//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::config::BufferCfg;
use crate::error::Error;
use crate::interface::IfNbr;
use crate::stat::NetStatPool;

// Buffer pool identity.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum BufPoolKind {
    RxLarge,
    TxLarge,
    TxSmall,
}

/// Fixed-capacity pool of packet buffers.
///
/// All buffers are allocated up front and recycled through a free list, so
/// the pool never grows after creation.
#[derive(Debug)]
pub struct BufPool {
    if_nbr: IfNbr,
    kind: BufPoolKind,
    buf_size: usize,
    state: Mutex<BufPoolState>,
}

#[derive(Debug)]
struct BufPoolState {
    free: Vec<BytesMut>,
    stat: NetStatPool,
}

/// The buffer pools of one interface.
///
/// Cloning is cheap; clones share the same pools, which is how the driver
/// receive context and the stack worker draw from a common budget.
#[derive(Clone, Debug)]
pub struct BufPools {
    rx_large: Arc<BufPool>,
    tx_large: Arc<BufPool>,
    tx_small: Arc<BufPool>,
}

// Snapshot of the statistics of all pools of an interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct BufPoolStats {
    pub rx_large: NetStatPool,
    pub tx_large: NetStatPool,
    pub tx_small: NetStatPool,
}

/// A packet buffer drawn from a [`BufPool`].
///
/// The buffer goes back to its pool when dropped.
#[derive(Debug)]
pub struct NetBuf {
    data: BytesMut,
    pool: Arc<BufPool>,
}

// ===== impl BufPool =====

impl BufPool {
    fn new(
        if_nbr: IfNbr,
        kind: BufPoolKind,
        nbr: u16,
        buf_size: u16,
    ) -> Arc<BufPool> {
        let buf_size = buf_size as usize;
        let free = (0..nbr)
            .map(|_| BytesMut::with_capacity(buf_size))
            .collect();
        Arc::new(BufPool {
            if_nbr,
            kind,
            buf_size,
            state: Mutex::new(BufPoolState {
                free,
                stat: NetStatPool::new(nbr as usize),
            }),
        })
    }

    pub fn kind(&self) -> BufPoolKind {
        self.kind
    }

    pub fn buf_size(&self) -> usize {
        self.buf_size
    }

    pub fn stat(&self) -> NetStatPool {
        self.state.lock().unwrap().stat
    }

    fn alloc(self: &Arc<Self>, size: usize) -> Result<NetBuf, Error> {
        if size > self.buf_size {
            return Err(Error::InvalidBufSize(self.kind, size));
        }

        let mut state = self.state.lock().unwrap();
        if !state.stat.entry_get() {
            return Err(Error::BufPoolEmpty(self.if_nbr, self.kind));
        }
        let data = match state.free.pop() {
            Some(data) => data,
            None => BytesMut::with_capacity(self.buf_size),
        };

        Ok(NetBuf {
            data,
            pool: self.clone(),
        })
    }

    fn release(&self, mut data: BytesMut) {
        data.clear();
        if data.capacity() < self.buf_size {
            data = BytesMut::with_capacity(self.buf_size);
        }

        let mut state = self.state.lock().unwrap();
        if !state.stat.entry_free() {
            drop(state);
            Error::BufPoolFault(self.if_nbr, self.kind).log();
            return;
        }
        state.free.push(data);
    }

    fn reset_high_water(&self) {
        self.state.lock().unwrap().stat.reset_used_max();
    }
}

// ===== impl BufPools =====

impl BufPools {
    pub fn new(if_nbr: IfNbr, cfg: &BufferCfg) -> BufPools {
        BufPools {
            rx_large: BufPool::new(
                if_nbr,
                BufPoolKind::RxLarge,
                cfg.rx_large_nbr,
                cfg.large_size,
            ),
            tx_large: BufPool::new(
                if_nbr,
                BufPoolKind::TxLarge,
                cfg.tx_large_nbr,
                cfg.large_size,
            ),
            tx_small: BufPool::new(
                if_nbr,
                BufPoolKind::TxSmall,
                cfg.tx_small_nbr,
                cfg.small_size,
            ),
        }
    }

    pub fn get(&self, kind: BufPoolKind) -> &Arc<BufPool> {
        match kind {
            BufPoolKind::RxLarge => &self.rx_large,
            BufPoolKind::TxLarge => &self.tx_large,
            BufPoolKind::TxSmall => &self.tx_small,
        }
    }

    /// Allocates a buffer able to hold `size` bytes from the given pool.
    ///
    /// Exhaustion is reported immediately; the caller decides whether and
    /// when to retry.
    pub fn alloc(
        &self,
        kind: BufPoolKind,
        size: usize,
    ) -> Result<NetBuf, Error> {
        self.get(kind).alloc(size)
    }

    /// Allocates a transmit buffer, using the small pool whenever `size`
    /// fits in it.
    pub fn alloc_tx(&self, size: usize) -> Result<NetBuf, Error> {
        if size <= self.tx_small.buf_size {
            self.tx_small.alloc(size)
        } else {
            self.tx_large.alloc(size)
        }
    }

    pub fn stats(&self) -> BufPoolStats {
        BufPoolStats {
            rx_large: self.rx_large.stat(),
            tx_large: self.tx_large.stat(),
            tx_small: self.tx_small.stat(),
        }
    }

    pub fn reset_high_water(&self) {
        self.rx_large.reset_high_water();
        self.tx_large.reset_high_water();
        self.tx_small.reset_high_water();
    }
}

// ===== impl NetBuf =====

impl NetBuf {
    pub fn kind(&self) -> BufPoolKind {
        self.pool.kind
    }

    pub fn capacity(&self) -> usize {
        self.pool.buf_size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut BytesMut {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the buffer to its pool.
    pub fn free(self) {}
}

impl Drop for NetBuf {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        self.pool.release(data);
    }
}
