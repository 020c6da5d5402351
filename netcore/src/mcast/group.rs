//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//
//
// Host side multicast group membership.
//
// Implements the host state machine shared by IGMPv1 (RFC 1112, appendix I)
// and MLDv1 (RFC 2710, section 5). A group present in the interface table is
// joined; the record tracks whether a report is pending and whether this
// host sent the last report heard on the link.

use std::time::Duration;

use chrono::{DateTime, Utc};
use netcore_utils::task::TimeoutTask;
use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::interface::IfNbr;
use crate::mcast::Version;

/// Joined multicast group.
#[derive(Debug)]
pub struct Group<V: Version> {
    /// Multicast group address.
    pub addr: V::IpAddr,
    /// Current membership state.
    pub state: GroupState,
    /// Whether this host sent the last report for the group.
    pub last_reporter: bool,
    /// Pending report timer (DelayingMember only).
    pub report_timer: Option<TimeoutTask>,
    /// Generation of the pending report timer.
    pub(crate) timer_gen: u64,
    /// Time the group was joined.
    pub joined: DateTime<Utc>,
}

/// Host membership states.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum GroupState {
    /// A report timer is running.
    DelayingMember,
    /// No report is pending.
    IdleMember,
}

// ===== impl Group =====

impl<V> Group<V>
where
    V: Version,
{
    pub(crate) fn new(addr: V::IpAddr) -> Group<V> {
        Group {
            addr,
            state: GroupState::IdleMember,
            last_reporter: false,
            report_timer: None,
            timer_gen: 0,
            joined: Utc::now(),
        }
    }

    pub(crate) fn set_state(&mut self, if_nbr: IfNbr, state: GroupState) {
        if self.state != state {
            Debug::GroupStateChange(
                if_nbr,
                &self.addr.into(),
                &self.state,
                &state,
            )
            .log();
            self.state = state;
        }
    }

    // Time left before the pending report goes out.
    pub fn report_remaining(&self) -> Option<Duration> {
        self.report_timer.as_ref().map(|timer| timer.remaining())
    }

    pub(crate) fn stop_report_timer(&mut self) {
        self.report_timer = None;
        self.timer_gen = 0;
    }
}
