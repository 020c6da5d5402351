//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use generational_arena::{Arena, Index};
use serde::{Deserialize, Serialize};

use crate::config::{ConnCfg, check_range};
use crate::debug::Debug;
use crate::error::Error;
use crate::stat::NetStatPool;

pub type ConnId = Index;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum ConnProto {
    Udp,
    Tcp,
}

// Transport connection record.
//
// Listening connections have no remote endpoint and match any peer.
#[derive(Debug)]
pub struct Conn {
    pub id: ConnId,
    pub proto: ConnProto,
    pub local: SocketAddr,
    pub remote: Option<SocketAddr>,
    // Lookups since the connection last moved to the front of the list.
    pub access_ctr: u16,
    pub created: DateTime<Utc>,
}

type ConnKey = (ConnProto, SocketAddr, Option<SocketAddr>);

/// Bounded connection table.
///
/// Connections are kept in a most-recently-used list: one looked up
/// `access_th` times moves to the front, which keeps busy connections
/// cheap to reach when walking the list.
#[derive(Debug)]
pub struct ConnTable {
    arena: Arena<Conn>,
    key_tree: BTreeMap<ConnKey, ConnId>,
    mru: VecDeque<ConnId>,
    stat: NetStatPool,
    access_th: u16,
}

// ===== impl ConnTable =====

impl ConnTable {
    pub(crate) fn new(cfg: &ConnCfg) -> ConnTable {
        ConnTable {
            arena: Arena::with_capacity(cfg.conn_max as usize),
            key_tree: Default::default(),
            mru: Default::default(),
            stat: NetStatPool::new(cfg.conn_max as usize),
            access_th: cfg.access_th,
        }
    }

    pub fn get(&self, id: ConnId) -> Option<&Conn> {
        self.arena.get(id)
    }

    // Connections from most to least recently promoted.
    pub fn iter(&self) -> impl Iterator<Item = &Conn> + '_ {
        self.mru.iter().map(|id| &self.arena[*id])
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn stats(&self) -> NetStatPool {
        self.stat
    }

    pub fn access_th(&self) -> u16 {
        self.access_th
    }

    pub(crate) fn reset_high_water(&mut self) {
        self.stat.reset_used_max();
    }

    pub(crate) fn set_access_th(&mut self, count: u16) -> Result<(), Error> {
        check_range("conn.access_th", count, ConnCfg::ACCESS_TH_RANGE)?;
        self.access_th = count;
        Ok(())
    }

    pub(crate) fn alloc(
        &mut self,
        proto: ConnProto,
        local: SocketAddr,
        remote: Option<SocketAddr>,
    ) -> Result<ConnId, Error> {
        let key = (proto, local, remote);
        if let Some(id) = self.key_tree.get(&key) {
            return Err(Error::ConnExists(*id));
        }
        if !self.stat.entry_get() {
            return Err(Error::ConnTableFull);
        }

        let id = self.arena.insert_with(|id| Conn {
            id,
            proto,
            local,
            remote,
            access_ctr: 0,
            created: Utc::now(),
        });
        self.key_tree.insert(key, id);
        self.mru.push_front(id);
        Debug::ConnAlloc(id, &self.arena[id]).log();

        Ok(id)
    }

    pub(crate) fn free(&mut self, id: ConnId) -> Result<(), Error> {
        let Some(conn) = self.arena.remove(id) else {
            return Err(Error::ConnNotFound(id));
        };
        self.key_tree.remove(&(conn.proto, conn.local, conn.remote));
        self.mru.retain(|mru_id| *mru_id != id);
        if !self.stat.entry_free() {
            Error::Fault("connection pool accounting").log();
        }
        Debug::ConnFree(id).log();

        Ok(())
    }

    /// Finds the connection matching a received packet, preferring an
    /// exact match over a listening connection. Counts as an access.
    pub(crate) fn lookup(
        &mut self,
        proto: ConnProto,
        local: SocketAddr,
        remote: SocketAddr,
    ) -> Option<ConnId> {
        let id = self
            .key_tree
            .get(&(proto, local, Some(remote)))
            .or_else(|| self.key_tree.get(&(proto, local, None)))
            .copied()?;
        self.access(id);
        Some(id)
    }

    fn access(&mut self, id: ConnId) {
        let access_th = self.access_th;
        let Some(conn) = self.arena.get_mut(id) else {
            return;
        };

        conn.access_ctr += 1;
        if conn.access_ctr < access_th {
            return;
        }
        conn.access_ctr = 0;
        Debug::ConnAccessThreshold(id, access_th).log();
        if let Some(pos) = self.mru.iter().position(|mru_id| *mru_id == id) {
            self.mru.remove(pos);
        }
        self.mru.push_front(id);
    }
}
