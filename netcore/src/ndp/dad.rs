//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::time::Duration;

use netcore_utils::UnboundedSender;
use netcore_utils::task::TimeoutTask;

use crate::debug::Debug;
use crate::error::Error;
use crate::hook::HookSlot;
use crate::interface::{IfNbr, Link};
use crate::ndp::send_ns;
use crate::tasks;
use crate::tasks::messages::input::DadTimeoutMsg;

// Duplicate address detection in progress for a tentative address.
#[derive(Debug)]
pub struct DadEntry {
    pub addr: Ipv6Addr,
    // Solicitations still to be sent.
    pub remaining: u8,
    pub(crate) hook: HookSlot,
    timer: Option<TimeoutTask>,
    timer_gen: u64,
}

#[derive(Debug)]
pub struct DadTable {
    if_nbr: IfNbr,
    entries: BTreeMap<Ipv6Addr, DadEntry>,
    next_timer_gen: u64,
}

// ===== impl DadTable =====

impl DadTable {
    pub(crate) fn new(if_nbr: IfNbr) -> DadTable {
        DadTable {
            if_nbr,
            entries: Default::default(),
            next_timer_gen: 0,
        }
    }

    pub fn get(&self, addr: &Ipv6Addr) -> Option<&DadEntry> {
        self.entries.get(addr)
    }

    pub fn contains(&self, addr: &Ipv6Addr) -> bool {
        self.entries.contains_key(addr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Sends the first probe for `addr` and arms the retransmission timer.
    pub(crate) fn start(
        &mut self,
        link: &mut Link,
        addr: Ipv6Addr,
        count: u8,
        interval: Duration,
        hook: HookSlot,
        dad_timeoutp: &UnboundedSender<DadTimeoutMsg>,
    ) -> Result<(), Error> {
        send_ns(link, Ipv6Addr::UNSPECIFIED, addr, None)?;

        Debug::DadStart(self.if_nbr, &addr).log();
        let mut entry = DadEntry {
            addr,
            remaining: count.saturating_sub(1),
            hook,
            timer: None,
            timer_gen: 0,
        };
        self.start_timer(&mut entry, interval, dad_timeoutp);
        self.entries.insert(addr, entry);

        Ok(())
    }

    /// Handles a retransmission timer expiry.
    ///
    /// Returns the entry once every probe went unanswered, which means the
    /// address is unique on the link.
    pub(crate) fn process_timeout(
        &mut self,
        link: &mut Link,
        addr: &Ipv6Addr,
        timer_gen: u64,
        interval: Duration,
        dad_timeoutp: &UnboundedSender<DadTimeoutMsg>,
    ) -> Option<DadEntry> {
        let entry = self.entries.get(addr)?;
        if entry.timer_gen != timer_gen {
            return None;
        }
        if entry.remaining == 0 {
            return self.entries.remove(addr);
        }

        let mut entry = self.entries.remove(addr)?;
        if let Err(error) = send_ns(link, Ipv6Addr::UNSPECIFIED, *addr, None) {
            error.log();
        }
        entry.remaining -= 1;
        self.start_timer(&mut entry, interval, dad_timeoutp);
        self.entries.insert(*addr, entry);

        None
    }

    // Stops detection for `addr`, returning its state.
    pub(crate) fn remove(&mut self, addr: &Ipv6Addr) -> Option<DadEntry> {
        self.entries.remove(addr)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    fn start_timer(
        &mut self,
        entry: &mut DadEntry,
        interval: Duration,
        dad_timeoutp: &UnboundedSender<DadTimeoutMsg>,
    ) {
        self.next_timer_gen += 1;
        entry.timer_gen = self.next_timer_gen;
        entry.timer = Some(tasks::dad_timeout(
            self.if_nbr,
            entry.addr,
            entry.timer_gen,
            interval,
            dad_timeoutp,
        ));
    }
}
