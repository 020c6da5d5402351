//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv6Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use generational_arena::Index;
use netcore_utils::UnboundedSender;
use netcore_utils::task::TimeoutTask;
use tracing::{Instrument, debug_span};

use crate::interface::IfNbr;
use crate::stack::{ProtocolInputChannelsRx, Stack};

//
// Network core tasks diagram:
//
//                  +------------+        +-------------------+
//                  |   driver   |        |   timers (Nx)     |
//                  +------------+        +-------------------+
//                        |                         |
//          net_rx (1x,   |                         | group_report_timer
//          bounded)      |                         | nbr_timeout
//                        V                         | dad_timeout
//                  +------------+                  | dhcp_timeout
//                  |            | <----------------+ autoip_timeout
//                  |   stack    |
//                  |   worker   | --> device tx (direct call)
//                  |            |
//                  +------------+
//

// Network core inter-task message types.
pub mod messages {
    use super::*;

    // Type aliases.
    pub type ProtocolInputMsg = input::ProtocolMsg;

    // Input messages (child task -> main task).
    pub mod input {
        use serde::{Deserialize, Serialize};

        use super::*;
        pub use crate::device::NetRxPacketMsg;

        #[derive(Debug)]
        pub enum ProtocolMsg {
            NetRxPacket(NetRxPacketMsg),
            GroupReportTimer(GroupReportTimerMsg),
            NbrTimeout(NbrTimeoutMsg),
            DadTimeout(DadTimeoutMsg),
            DhcpTimeout(DhcpTimeoutMsg),
            AutoIpTimeout(AutoIpTimeoutMsg),
        }

        #[derive(Clone, Copy, Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct GroupReportTimerMsg {
            pub if_nbr: IfNbr,
            pub group: IpAddr,
            pub timer_gen: u64,
        }

        #[derive(Clone, Copy, Debug)]
        pub struct NbrTimeoutMsg {
            pub if_nbr: IfNbr,
            pub nbr_idx: Index,
            pub timer_gen: u64,
        }

        #[derive(Clone, Copy, Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct DadTimeoutMsg {
            pub if_nbr: IfNbr,
            pub addr: Ipv6Addr,
            pub timer_gen: u64,
        }

        #[derive(Clone, Copy, Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct DhcpTimeoutMsg {
            pub if_nbr: IfNbr,
            pub timer_gen: u64,
        }

        #[derive(Clone, Copy, Debug)]
        #[derive(Deserialize, Serialize)]
        pub struct AutoIpTimeoutMsg {
            pub if_nbr: IfNbr,
            pub timer_gen: u64,
        }
    }
}

use messages::input::{
    AutoIpTimeoutMsg, DadTimeoutMsg, DhcpTimeoutMsg, GroupReportTimerMsg,
    NbrTimeoutMsg,
};

// ===== network core tasks =====

/// Stack worker: processes input messages until every input channel
/// closes.
///
/// The stack lock is held while a single message is processed, never across
/// an await point.
pub async fn event_loop(
    stack: Arc<Mutex<Stack>>,
    mut rx: ProtocolInputChannelsRx,
) {
    let span = debug_span!("netcore");
    async move {
        while let Some(msg) = rx.recv().await {
            stack.lock().unwrap().process_protocol_msg(msg);
        }
    }
    .instrument(span)
    .await
}

// Multicast group report timer.
pub(crate) fn group_report_timer(
    if_nbr: IfNbr,
    group: IpAddr,
    timer_gen: u64,
    delay: Duration,
    report_timerp: &UnboundedSender<GroupReportTimerMsg>,
) -> TimeoutTask {
    let report_timerp = report_timerp.clone();
    TimeoutTask::new(delay, move || async move {
        let msg = GroupReportTimerMsg {
            if_nbr,
            group,
            timer_gen,
        };
        let _ = report_timerp.send(msg);
    })
}

// Neighbor cache entry timer.
pub(crate) fn nbr_timeout(
    if_nbr: IfNbr,
    nbr_idx: Index,
    timer_gen: u64,
    timeout: Duration,
    nbr_timeoutp: &UnboundedSender<NbrTimeoutMsg>,
) -> TimeoutTask {
    let nbr_timeoutp = nbr_timeoutp.clone();
    TimeoutTask::new(timeout, move || async move {
        let msg = NbrTimeoutMsg {
            if_nbr,
            nbr_idx,
            timer_gen,
        };
        let _ = nbr_timeoutp.send(msg);
    })
}

// Duplicate address detection retransmission timer.
pub(crate) fn dad_timeout(
    if_nbr: IfNbr,
    addr: Ipv6Addr,
    timer_gen: u64,
    interval: Duration,
    dad_timeoutp: &UnboundedSender<DadTimeoutMsg>,
) -> TimeoutTask {
    let dad_timeoutp = dad_timeoutp.clone();
    TimeoutTask::new(interval, move || async move {
        let msg = DadTimeoutMsg {
            if_nbr,
            addr,
            timer_gen,
        };
        let _ = dad_timeoutp.send(msg);
    })
}

// DHCP retransmission and lease timer.
pub(crate) fn dhcp_timeout(
    if_nbr: IfNbr,
    timer_gen: u64,
    timeout: Duration,
    dhcp_timeoutp: &UnboundedSender<DhcpTimeoutMsg>,
) -> TimeoutTask {
    let dhcp_timeoutp = dhcp_timeoutp.clone();
    TimeoutTask::new(timeout, move || async move {
        let msg = DhcpTimeoutMsg { if_nbr, timer_gen };
        let _ = dhcp_timeoutp.send(msg);
    })
}

// IPv4 link-local probe and announcement timer.
pub(crate) fn autoip_timeout(
    if_nbr: IfNbr,
    timer_gen: u64,
    timeout: Duration,
    autoip_timeoutp: &UnboundedSender<AutoIpTimeoutMsg>,
) -> TimeoutTask {
    let autoip_timeoutp = autoip_timeoutp.clone();
    TimeoutTask::new(timeout, move || async move {
        let msg = AutoIpTimeoutMsg { if_nbr, timer_gen };
        let _ = autoip_timeoutp.send(msg);
    })
}
