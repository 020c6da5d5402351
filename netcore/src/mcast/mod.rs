//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod group;

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use netcore_utils::UnboundedSender;
use netcore_utils::ip::{IpAddrKind, Ipv6AddrExt};
use netcore_utils::mac_addr::MacAddr;
use rand::Rng;

use crate::config::Config;
use crate::debug::Debug;
use crate::device::NetProto;
use crate::error::Error;
use crate::interface::{IfNbr, Link};
use crate::mcast::group::{Group, GroupState};
use crate::tasks;
use crate::tasks::messages::input::GroupReportTimerMsg;
use crate::{igmp, mld};

// Host group membership protocol version.
pub trait Version
where
    Self: 'static + Send + Sync + std::fmt::Debug + Sized,
{
    const PROTOCOL: &'static str;

    // Group every host belongs to. It is never reported nor left.
    const ALL_HOSTS: Self::IpAddr;

    // Whether a query with a shorter response bound restarts a running
    // report timer.
    const QUERY_SHORTENS_DELAY: bool;

    type IpAddr: IpAddrKind;

    fn is_valid_group(group: &Self::IpAddr) -> bool;

    fn host_grp_max(config: &Config) -> usize;

    fn unsolicited_report_interval(config: &Config) -> Duration;

    fn send_report(
        link: &mut Link,
        src: Self::IpAddr,
        group: Self::IpAddr,
    ) -> Result<(), Error>;

    fn send_leave(
        link: &mut Link,
        src: Self::IpAddr,
        group: Self::IpAddr,
    ) -> Result<(), Error>;
}

#[derive(Debug)]
pub struct Igmpv1();

#[derive(Debug)]
pub struct Mldv1();

// Per-interface table of joined groups.
#[derive(Debug)]
pub struct McastGroups<V: Version> {
    if_nbr: IfNbr,
    groups: BTreeMap<V::IpAddr, Group<V>>,
    next_timer_gen: u64,
}

// What the membership engine needs from its surroundings.
pub(crate) struct McastCtx<'a, V: Version> {
    pub link: &'a mut Link,
    pub src: V::IpAddr,
    pub config: &'a Config,
    pub report_timerp: &'a UnboundedSender<GroupReportTimerMsg>,
}

// ===== impl Igmpv1 =====

impl Version for Igmpv1 {
    const PROTOCOL: &'static str = "igmp";
    const ALL_HOSTS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);
    const QUERY_SHORTENS_DELAY: bool = false;

    type IpAddr = Ipv4Addr;

    fn is_valid_group(group: &Ipv4Addr) -> bool {
        group.is_multicast() && *group != Self::ALL_HOSTS
    }

    fn host_grp_max(config: &Config) -> usize {
        config.igmp.host_grp_max as usize
    }

    fn unsolicited_report_interval(config: &Config) -> Duration {
        Duration::from_secs(config.igmp.unsolicited_report_interval.into())
    }

    fn send_report(
        link: &mut Link,
        src: Ipv4Addr,
        group: Ipv4Addr,
    ) -> Result<(), Error> {
        let packet = igmp::Packet::report(group);
        link.send(
            NetProto::Igmp,
            src.into(),
            group.into(),
            Some(MacAddr::from_ipv4_mcast(&group)),
            &packet.encode(),
        )
    }

    // IGMPv1 has no leave message.
    fn send_leave(
        _link: &mut Link,
        _src: Ipv4Addr,
        _group: Ipv4Addr,
    ) -> Result<(), Error> {
        Ok(())
    }
}

// ===== impl Mldv1 =====

impl Version for Mldv1 {
    const PROTOCOL: &'static str = "mld";
    const ALL_HOSTS: Ipv6Addr = Ipv6Addr::ALL_NODES;
    const QUERY_SHORTENS_DELAY: bool = true;

    type IpAddr = Ipv6Addr;

    // Reserved (0) and interface-local (1) scopes are never reported.
    fn is_valid_group(group: &Ipv6Addr) -> bool {
        let scope = group.octets()[1] & 0x0f;
        group.is_multicast() && *group != Self::ALL_HOSTS && scope > 1
    }

    fn host_grp_max(config: &Config) -> usize {
        config.mld.host_grp_max as usize
    }

    fn unsolicited_report_interval(config: &Config) -> Duration {
        Duration::from_secs(config.mld.unsolicited_report_interval.into())
    }

    fn send_report(
        link: &mut Link,
        src: Ipv6Addr,
        group: Ipv6Addr,
    ) -> Result<(), Error> {
        let packet = mld::Packet::report(group);
        link.send(
            NetProto::Icmpv6,
            src.into(),
            group.into(),
            Some(MacAddr::from_ipv6_mcast(&group)),
            &packet.encode(&src, &group),
        )
    }

    fn send_leave(
        link: &mut Link,
        src: Ipv6Addr,
        group: Ipv6Addr,
    ) -> Result<(), Error> {
        let dst = Ipv6Addr::ALL_ROUTERS;
        let packet = mld::Packet::done(group);
        link.send(
            NetProto::Icmpv6,
            src.into(),
            dst.into(),
            Some(MacAddr::from_ipv6_mcast(&dst)),
            &packet.encode(&src, &dst),
        )
    }
}

// ===== impl McastGroups =====

impl<V> McastGroups<V>
where
    V: Version,
{
    pub(crate) fn new(if_nbr: IfNbr) -> McastGroups<V> {
        McastGroups {
            if_nbr,
            groups: Default::default(),
            next_timer_gen: 0,
        }
    }

    pub fn get(&self, group: &V::IpAddr) -> Option<&Group<V>> {
        self.groups.get(group)
    }

    pub fn iter(&self) -> btree_map::Values<'_, V::IpAddr, Group<V>> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    // The all-hosts group is implicitly joined.
    pub fn is_joined(&self, group: &V::IpAddr) -> bool {
        *group == V::ALL_HOSTS || self.groups.contains_key(group)
    }

    /// Joins `group`, sending an unsolicited report right away and arming a
    /// second one after a random delay.
    ///
    /// Joining an already joined group succeeds without side effects. When
    /// the initial report can't be sent nothing is recorded.
    pub(crate) fn join(
        &mut self,
        ctx: &mut McastCtx<'_, V>,
        group: V::IpAddr,
    ) -> Result<(), Error> {
        if !V::is_valid_group(&group) {
            return Err(Error::InvalidGroupAddr(group.into()));
        }
        if self.is_joined(&group) {
            return Ok(());
        }
        if self.groups.len() >= V::host_grp_max(ctx.config) {
            return Err(Error::GroupCountExceeded(self.if_nbr, group.into()));
        }

        V::send_report(ctx.link, ctx.src, group)?;

        Debug::GroupJoin(self.if_nbr, &group.into()).log();
        let mut grp = Group::new(group);
        grp.last_reporter = true;
        let delay = random_delay(V::unsolicited_report_interval(ctx.config));
        self.start_report_timer(ctx, &mut grp, delay);
        self.groups.insert(group, grp);

        Ok(())
    }

    /// Leaves `group`. A leave message goes out only when this host sent
    /// the last report; transmit failures are logged and otherwise ignored.
    pub(crate) fn leave(
        &mut self,
        ctx: &mut McastCtx<'_, V>,
        group: V::IpAddr,
    ) -> Result<(), Error> {
        let Some(grp) = self.groups.remove(&group) else {
            return Err(Error::GroupNotJoined(self.if_nbr, group.into()));
        };

        Debug::GroupLeave(self.if_nbr, &group.into()).log();
        if grp.last_reporter {
            if let Err(error) = V::send_leave(ctx.link, ctx.src, group) {
                error.log();
            }
        }

        Ok(())
    }

    // Drops every group without signaling anything.
    pub(crate) fn clear(&mut self) {
        self.groups.clear();
    }

    /// Processes a membership query for a specific group, or for all groups
    /// when `group` is `None`.
    pub(crate) fn process_query(
        &mut self,
        ctx: &mut McastCtx<'_, V>,
        group: Option<V::IpAddr>,
        max_resp: Duration,
    ) {
        let addrs = match group {
            Some(group) if self.groups.contains_key(&group) => vec![group],
            Some(_) => return,
            None => self.groups.keys().copied().collect::<Vec<_>>(),
        };

        for addr in addrs {
            let Some(mut grp) = self.groups.remove(&addr) else {
                continue;
            };
            let delay = random_delay(max_resp);
            match grp.state {
                GroupState::IdleMember => {
                    self.start_report_timer(ctx, &mut grp, delay);
                }
                GroupState::DelayingMember => {
                    if V::QUERY_SHORTENS_DELAY
                        && grp
                            .report_remaining()
                            .is_some_and(|remaining| max_resp < remaining)
                    {
                        self.start_report_timer(ctx, &mut grp, delay);
                    }
                }
            }
            self.groups.insert(addr, grp);
        }
    }

    // Another host reported the group: suppress our pending report.
    pub(crate) fn process_report(&mut self, group: &V::IpAddr) {
        let if_nbr = self.if_nbr;
        let Some(grp) = self.groups.get_mut(group) else {
            return;
        };

        if grp.state == GroupState::DelayingMember {
            grp.stop_report_timer();
            grp.set_state(if_nbr, GroupState::IdleMember);
        }
        grp.last_reporter = false;
    }

    pub(crate) fn process_report_timer(
        &mut self,
        ctx: &mut McastCtx<'_, V>,
        group: &V::IpAddr,
        timer_gen: u64,
    ) {
        let if_nbr = self.if_nbr;
        let Some(grp) = self.groups.get_mut(group) else {
            return;
        };
        // Ignore stale expirations.
        if grp.state != GroupState::DelayingMember || grp.timer_gen != timer_gen
        {
            return;
        }

        grp.stop_report_timer();
        grp.set_state(if_nbr, GroupState::IdleMember);
        match V::send_report(ctx.link, ctx.src, *group) {
            Ok(()) => grp.last_reporter = true,
            Err(error) => error.log(),
        }
    }

    fn start_report_timer(
        &mut self,
        ctx: &mut McastCtx<'_, V>,
        grp: &mut Group<V>,
        delay: Duration,
    ) {
        self.next_timer_gen += 1;
        let timer_gen = self.next_timer_gen;

        Debug::GroupReportTimerStart(self.if_nbr, &grp.addr.into(), delay)
            .log();
        grp.timer_gen = timer_gen;
        grp.report_timer = Some(tasks::group_report_timer(
            self.if_nbr,
            grp.addr.into(),
            timer_gen,
            delay,
            ctx.report_timerp,
        ));
        grp.set_state(self.if_nbr, GroupState::DelayingMember);
    }
}

// ===== global functions =====

// Picks a random delay in the [0, max] range, at millisecond granularity.
pub(crate) fn random_delay(max: Duration) -> Duration {
    let max = max.as_millis() as u64;
    Duration::from_millis(rand::rng().random_range(0..=max))
}
