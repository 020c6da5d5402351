//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::error::ErrorKind;
use crate::interface::IfNbr;

// Outcome of an address configuration attempt.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AddrCfgStatus {
    #[default]
    None,
    Success,
    LinkLocal,
    InProgress,
    FailAddrUsed,
    FailOfferDecline,
    FailNakRx,
    FailNoServer,
    FailErrFault,
}

// Information passed to a completion hook.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AddrCfgOutcome {
    pub if_nbr: IfNbr,
    pub status: AddrCfgStatus,
    pub addr: Option<IpAddr>,
    pub mask: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub error: Option<ErrorKind>,
}

/// Completion hook for asynchronous address configuration (DHCP, IPv4
/// link-local, IPv6 duplicate address detection).
///
/// Closures taking an [`AddrCfgOutcome`] implement this trait.
pub trait AddrCfgHook: Send + Sync {
    fn on_complete(&self, outcome: &AddrCfgOutcome);
}

// Hook slot that fires at most once per configuration attempt.
#[derive(Default)]
pub(crate) struct HookSlot {
    hook: Option<Arc<dyn AddrCfgHook>>,
    fired: bool,
}

// ===== impl AddrCfgStatus =====

impl AddrCfgStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AddrCfgStatus::FailAddrUsed
                | AddrCfgStatus::FailOfferDecline
                | AddrCfgStatus::FailNakRx
                | AddrCfgStatus::FailNoServer
                | AddrCfgStatus::FailErrFault
        )
    }
}

// ===== impl AddrCfgOutcome =====

impl AddrCfgOutcome {
    pub(crate) fn new(if_nbr: IfNbr, status: AddrCfgStatus) -> Self {
        AddrCfgOutcome {
            if_nbr,
            status,
            addr: None,
            mask: None,
            gateway: None,
            error: None,
        }
    }

    pub(crate) fn with_addr(
        mut self,
        addr: impl Into<IpAddr>,
        mask: Option<Ipv4Addr>,
        gateway: Option<Ipv4Addr>,
    ) -> Self {
        self.addr = Some(addr.into());
        self.mask = mask;
        self.gateway = gateway;
        self
    }

    pub(crate) fn with_error(mut self, error: ErrorKind) -> Self {
        self.error = Some(error);
        self
    }
}

// ===== impl AddrCfgHook =====

impl<F> AddrCfgHook for F
where
    F: Fn(&AddrCfgOutcome) + Send + Sync,
{
    fn on_complete(&self, outcome: &AddrCfgOutcome) {
        (self)(outcome)
    }
}

// ===== impl HookSlot =====

impl HookSlot {
    pub(crate) fn new(hook: Option<Arc<dyn AddrCfgHook>>) -> Self {
        HookSlot { hook, fired: false }
    }

    // Invokes the hook unless it already fired for the current attempt.
    pub(crate) fn fire(&mut self, outcome: AddrCfgOutcome) {
        if self.fired {
            return;
        }
        self.fired = true;

        Debug::HookInvoke(&outcome).log();
        if let Some(hook) = &self.hook {
            hook.on_complete(&outcome);
        }
    }

    // Starts a new attempt with the same hook.
    pub(crate) fn rearm(&mut self) {
        self.fired = false;
    }
}

impl std::fmt::Debug for HookSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSlot")
            .field("hook", &self.hook.is_some())
            .field("fired", &self.fired)
            .finish()
    }
}
