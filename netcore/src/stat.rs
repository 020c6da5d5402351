//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serialize};

/// Usage statistics of a fixed-capacity pool of entries.
///
/// Shared by the buffer pools and the connection table. The owner is
/// expected to serialize access (pool lock or `&mut` ownership).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NetStatPool {
    pub entries_init: usize,
    pub entries_total: usize,
    pub entries_avail: usize,
    pub entries_used: usize,
    pub entries_used_max: usize,
    pub entries_lost_cur: usize,
    pub entries_lost_total: usize,
    pub entries_alloc_ctr: u64,
    pub entries_dealloc_ctr: u64,
}

// ===== impl NetStatPool =====

impl NetStatPool {
    pub fn new(entries: usize) -> NetStatPool {
        NetStatPool {
            entries_init: entries,
            entries_total: entries,
            entries_avail: entries,
            ..Default::default()
        }
    }

    // Accounts for one allocated entry. Returns false when the pool is empty.
    pub(crate) fn entry_get(&mut self) -> bool {
        if self.entries_avail == 0 {
            return false;
        }

        self.entries_avail -= 1;
        self.entries_used += 1;
        self.entries_alloc_ctr += 1;
        if self.entries_used > self.entries_used_max {
            self.entries_used_max = self.entries_used;
        }

        true
    }

    // Accounts for one released entry. Releasing into a pool with nothing in
    // use is counted as a lost entry and reported to the caller.
    pub(crate) fn entry_free(&mut self) -> bool {
        if self.entries_used == 0 {
            self.entries_lost_cur += 1;
            self.entries_lost_total += 1;
            return false;
        }

        self.entries_used -= 1;
        self.entries_avail += 1;
        self.entries_dealloc_ctr += 1;

        true
    }

    /// Resets the high-water mark to the current usage.
    pub fn reset_used_max(&mut self) {
        self.entries_used_max = self.entries_used;
    }

    pub fn reset_lost(&mut self) {
        self.entries_lost_cur = 0;
    }
}
