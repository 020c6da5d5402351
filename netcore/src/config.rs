//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub rx_queue_size: u16,
    pub buffers: BufferCfg,
    pub ipv4: Ipv4Cfg,
    pub ipv6: Ipv6Cfg,
    pub igmp: IgmpCfg,
    pub mld: MldCfg,
    pub ndp: NdpCfg,
    pub icmp: IcmpCfg,
    pub conn: ConnCfg,
    pub dhcp: DhcpCfg,
    pub autoip: AutoIpCfg,
    pub logging: Logging,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BufferCfg {
    pub rx_large_nbr: u16,
    pub tx_large_nbr: u16,
    pub tx_small_nbr: u16,
    pub large_size: u16,
    pub small_size: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Ipv4Cfg {
    pub addrs_max: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Ipv6Cfg {
    pub addrs_max: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IgmpCfg {
    pub host_grp_max: u16,
    // Seconds.
    pub unsolicited_report_interval: u16,
    // Seconds. IGMPv1 queries carry no response time.
    pub query_resp_max: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MldCfg {
    pub host_grp_max: u16,
    // Seconds.
    pub unsolicited_report_interval: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NdpCfg {
    pub cache_timeout: u16,
    pub reachable_timeout: u16,
    pub delay_timeout: u16,
    pub solicit_timeout: u16,
    pub solicit_max_mcast: u8,
    pub solicit_max_ucast: u8,
    pub solicit_max_dad: u8,
    pub tx_q_max_th: u8,
    pub cache_max: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IcmpCfg {
    pub echo_req_max: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnCfg {
    pub conn_max: u16,
    pub access_th: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DhcpCfg {
    pub server_port: u16,
    pub client_port: u16,
    pub retry_max: u8,
    // Seconds, doubled on every retransmission.
    pub timeout: u16,
    pub validate_addr: bool,
    // Seconds.
    pub validate_timeout: u16,
    pub link_local_fallback: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoIpCfg {
    pub probe_num: u8,
    // Seconds.
    pub probe_interval: u16,
    pub announce_num: u8,
    // Seconds.
    pub announce_interval: u16,
    pub max_conflicts: u8,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub filter: String,
    pub file: LoggingFile,
    pub stdout: LoggingStdout,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFile {
    pub enabled: bool,
    pub dir: String,
    pub name: String,
    pub rotation: LoggingFileRotation,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingStdout {
    pub enabled: bool,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFmt {
    pub style: LoggingFmtStyle,
    pub colors: bool,
    pub show_thread_id: bool,
    pub show_source: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFileRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFmtStyle {
    Compact,
    Full,
    Json,
    Pretty,
}

// Neighbor cache timers tunable through `cfg_reachability_timeout`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NdpTimeoutKind {
    Reachable,
    Delay,
    Solicit,
}

// Solicitation kinds tunable through `cfg_solicit_max_nbr`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NdpSolicitKind {
    Multicast,
    Unicast,
    Dad,
}

// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(toml::de::Error),
    Invalid(Error),
}

// ===== impl Config =====

impl Config {
    pub const RX_QUEUE_SIZE_RANGE: RangeInclusive<u64> = 1..=1024;

    /// Loads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let config_str =
            std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: Config =
            toml::from_str(&config_str).map_err(ConfigError::Parse)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Checks every knob against its accepted range.
    pub fn validate(&self) -> Result<(), Error> {
        check_range(
            "rx_queue_size",
            self.rx_queue_size,
            Self::RX_QUEUE_SIZE_RANGE,
        )?;
        self.buffers.validate()?;
        check_range(
            "ipv4.addrs_max",
            self.ipv4.addrs_max,
            Ipv4Cfg::ADDRS_MAX_RANGE,
        )?;
        check_range(
            "ipv6.addrs_max",
            self.ipv6.addrs_max,
            Ipv6Cfg::ADDRS_MAX_RANGE,
        )?;
        self.igmp.validate()?;
        self.mld.validate()?;
        self.ndp.validate()?;
        check_range(
            "icmp.echo_req_max",
            self.icmp.echo_req_max,
            IcmpCfg::ECHO_REQ_MAX_RANGE,
        )?;
        check_range(
            "conn.conn_max",
            self.conn.conn_max,
            ConnCfg::CONN_MAX_RANGE,
        )?;
        check_range(
            "conn.access_th",
            self.conn.access_th,
            ConnCfg::ACCESS_TH_RANGE,
        )?;
        self.dhcp.validate()?;
        self.autoip.validate()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            rx_queue_size: 16,
            buffers: Default::default(),
            ipv4: Default::default(),
            ipv6: Default::default(),
            igmp: Default::default(),
            mld: Default::default(),
            ndp: Default::default(),
            icmp: Default::default(),
            conn: Default::default(),
            dhcp: Default::default(),
            autoip: Default::default(),
            logging: Default::default(),
        }
    }
}

// ===== impl BufferCfg =====

impl BufferCfg {
    pub const NBR_RANGE: RangeInclusive<u64> = 1..=1024;
    pub const SIZE_RANGE: RangeInclusive<u64> = 64..=9216;

    fn validate(&self) -> Result<(), Error> {
        check_range(
            "buffers.rx_large_nbr",
            self.rx_large_nbr,
            Self::NBR_RANGE,
        )?;
        check_range(
            "buffers.tx_large_nbr",
            self.tx_large_nbr,
            Self::NBR_RANGE,
        )?;
        check_range(
            "buffers.tx_small_nbr",
            self.tx_small_nbr,
            Self::NBR_RANGE,
        )?;
        check_range("buffers.large_size", self.large_size, Self::SIZE_RANGE)?;
        check_range(
            "buffers.small_size",
            self.small_size,
            *Self::SIZE_RANGE.start()..=self.large_size as u64,
        )?;
        Ok(())
    }
}

impl Default for BufferCfg {
    fn default() -> BufferCfg {
        BufferCfg {
            rx_large_nbr: 10,
            tx_large_nbr: 8,
            tx_small_nbr: 16,
            large_size: 1536,
            small_size: 256,
        }
    }
}

// ===== impl Ipv4Cfg =====

impl Ipv4Cfg {
    pub const ADDRS_MAX_RANGE: RangeInclusive<u64> = 1..=16;
}

impl Default for Ipv4Cfg {
    fn default() -> Ipv4Cfg {
        Ipv4Cfg { addrs_max: 4 }
    }
}

// ===== impl Ipv6Cfg =====

impl Ipv6Cfg {
    pub const ADDRS_MAX_RANGE: RangeInclusive<u64> = 1..=16;
}

impl Default for Ipv6Cfg {
    fn default() -> Ipv6Cfg {
        Ipv6Cfg { addrs_max: 4 }
    }
}

// ===== impl IgmpCfg =====

impl IgmpCfg {
    pub const HOST_GRP_MAX_RANGE: RangeInclusive<u64> = 1..=256;
    pub const REPORT_INTERVAL_RANGE: RangeInclusive<u64> = 1..=25;
    pub const QUERY_RESP_MAX_RANGE: RangeInclusive<u64> = 1..=25;

    fn validate(&self) -> Result<(), Error> {
        check_range(
            "igmp.host_grp_max",
            self.host_grp_max,
            Self::HOST_GRP_MAX_RANGE,
        )?;
        check_range(
            "igmp.unsolicited_report_interval",
            self.unsolicited_report_interval,
            Self::REPORT_INTERVAL_RANGE,
        )?;
        check_range(
            "igmp.query_resp_max",
            self.query_resp_max,
            Self::QUERY_RESP_MAX_RANGE,
        )
    }
}

impl Default for IgmpCfg {
    fn default() -> IgmpCfg {
        IgmpCfg {
            host_grp_max: 8,
            unsolicited_report_interval: 2,
            query_resp_max: 10,
        }
    }
}

// ===== impl MldCfg =====

impl MldCfg {
    pub const HOST_GRP_MAX_RANGE: RangeInclusive<u64> = 1..=256;
    pub const REPORT_INTERVAL_RANGE: RangeInclusive<u64> = 1..=60;

    fn validate(&self) -> Result<(), Error> {
        check_range(
            "mld.host_grp_max",
            self.host_grp_max,
            Self::HOST_GRP_MAX_RANGE,
        )?;
        check_range(
            "mld.unsolicited_report_interval",
            self.unsolicited_report_interval,
            Self::REPORT_INTERVAL_RANGE,
        )
    }
}

impl Default for MldCfg {
    fn default() -> MldCfg {
        MldCfg {
            host_grp_max: 8,
            unsolicited_report_interval: 10,
        }
    }
}

// ===== impl NdpCfg =====

impl NdpCfg {
    pub const CACHE_TIMEOUT_RANGE: RangeInclusive<u64> = 60..=600;
    pub const REACHABLE_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=120;
    pub const DELAY_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=10;
    pub const SOLICIT_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=10;
    pub const SOLICIT_MAX_MCAST_RANGE: RangeInclusive<u64> = 1..=10;
    pub const SOLICIT_MAX_UCAST_RANGE: RangeInclusive<u64> = 1..=10;
    pub const SOLICIT_MAX_DAD_RANGE: RangeInclusive<u64> = 0..=5;
    pub const TX_Q_MAX_TH_RANGE: RangeInclusive<u64> = 1..=10;
    pub const CACHE_MAX_RANGE: RangeInclusive<u64> = 1..=256;

    /// Sets the lifetime of STALE entries.
    pub fn set_cache_timeout(&mut self, secs: u16) -> Result<(), Error> {
        check_range("ndp.cache_timeout", secs, Self::CACHE_TIMEOUT_RANGE)?;
        self.cache_timeout = secs;
        Ok(())
    }

    pub fn set_timeout(
        &mut self,
        kind: NdpTimeoutKind,
        secs: u16,
    ) -> Result<(), Error> {
        match kind {
            NdpTimeoutKind::Reachable => {
                check_range(
                    "ndp.reachable_timeout",
                    secs,
                    Self::REACHABLE_TIMEOUT_RANGE,
                )?;
                self.reachable_timeout = secs;
            }
            NdpTimeoutKind::Delay => {
                check_range(
                    "ndp.delay_timeout",
                    secs,
                    Self::DELAY_TIMEOUT_RANGE,
                )?;
                self.delay_timeout = secs;
            }
            NdpTimeoutKind::Solicit => {
                check_range(
                    "ndp.solicit_timeout",
                    secs,
                    Self::SOLICIT_TIMEOUT_RANGE,
                )?;
                self.solicit_timeout = secs;
            }
        }
        Ok(())
    }

    pub fn set_solicit_max(
        &mut self,
        kind: NdpSolicitKind,
        count: u8,
    ) -> Result<(), Error> {
        match kind {
            NdpSolicitKind::Multicast => {
                check_range(
                    "ndp.solicit_max_mcast",
                    count,
                    Self::SOLICIT_MAX_MCAST_RANGE,
                )?;
                self.solicit_max_mcast = count;
            }
            NdpSolicitKind::Unicast => {
                check_range(
                    "ndp.solicit_max_ucast",
                    count,
                    Self::SOLICIT_MAX_UCAST_RANGE,
                )?;
                self.solicit_max_ucast = count;
            }
            NdpSolicitKind::Dad => {
                check_range(
                    "ndp.solicit_max_dad",
                    count,
                    Self::SOLICIT_MAX_DAD_RANGE,
                )?;
                self.solicit_max_dad = count;
            }
        }
        Ok(())
    }

    pub fn set_tx_q_max_th(&mut self, count: u8) -> Result<(), Error> {
        check_range("ndp.tx_q_max_th", count, Self::TX_Q_MAX_TH_RANGE)?;
        self.tx_q_max_th = count;
        Ok(())
    }

    pub(crate) fn timeout(&self, kind: NdpTimeoutKind) -> Duration {
        let secs = match kind {
            NdpTimeoutKind::Reachable => self.reachable_timeout,
            NdpTimeoutKind::Delay => self.delay_timeout,
            NdpTimeoutKind::Solicit => self.solicit_timeout,
        };
        Duration::from_secs(secs.into())
    }

    // Lifetime of a STALE entry.
    pub(crate) fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_timeout.into())
    }

    pub(crate) fn solicit_max(&self, kind: NdpSolicitKind) -> u8 {
        match kind {
            NdpSolicitKind::Multicast => self.solicit_max_mcast,
            NdpSolicitKind::Unicast => self.solicit_max_ucast,
            NdpSolicitKind::Dad => self.solicit_max_dad,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let mut cfg = self.clone();
        cfg.set_cache_timeout(self.cache_timeout)?;
        cfg.set_timeout(NdpTimeoutKind::Reachable, self.reachable_timeout)?;
        cfg.set_timeout(NdpTimeoutKind::Delay, self.delay_timeout)?;
        cfg.set_timeout(NdpTimeoutKind::Solicit, self.solicit_timeout)?;
        cfg.set_solicit_max(
            NdpSolicitKind::Multicast,
            self.solicit_max_mcast,
        )?;
        cfg.set_solicit_max(NdpSolicitKind::Unicast, self.solicit_max_ucast)?;
        cfg.set_solicit_max(NdpSolicitKind::Dad, self.solicit_max_dad)?;
        cfg.set_tx_q_max_th(self.tx_q_max_th)?;
        check_range("ndp.cache_max", self.cache_max, Self::CACHE_MAX_RANGE)
    }
}

impl Default for NdpCfg {
    fn default() -> NdpCfg {
        NdpCfg {
            cache_timeout: 600,
            reachable_timeout: 30,
            delay_timeout: 5,
            solicit_timeout: 1,
            solicit_max_mcast: 3,
            solicit_max_ucast: 3,
            solicit_max_dad: 1,
            tx_q_max_th: 2,
            cache_max: 16,
        }
    }
}

// ===== impl IcmpCfg =====

impl IcmpCfg {
    pub const ECHO_REQ_MAX_RANGE: RangeInclusive<u64> = 1..=256;
}

impl Default for IcmpCfg {
    fn default() -> IcmpCfg {
        IcmpCfg { echo_req_max: 8 }
    }
}

// ===== impl ConnCfg =====

impl ConnCfg {
    pub const CONN_MAX_RANGE: RangeInclusive<u64> = 1..=4096;
    pub const ACCESS_TH_RANGE: RangeInclusive<u64> = 10..=65000;

    pub fn set_access_th(&mut self, count: u16) -> Result<(), Error> {
        check_range("conn.access_th", count, Self::ACCESS_TH_RANGE)?;
        self.access_th = count;
        Ok(())
    }
}

impl Default for ConnCfg {
    fn default() -> ConnCfg {
        ConnCfg {
            conn_max: 20,
            access_th: 100,
        }
    }
}

// ===== impl DhcpCfg =====

impl DhcpCfg {
    pub const RETRY_MAX_RANGE: RangeInclusive<u64> = 1..=10;
    pub const TIMEOUT_RANGE: RangeInclusive<u64> = 1..=60;
    pub const VALIDATE_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=10;

    pub fn validate(&self) -> Result<(), Error> {
        check_range("dhcp.retry_max", self.retry_max, Self::RETRY_MAX_RANGE)?;
        check_range("dhcp.timeout", self.timeout, Self::TIMEOUT_RANGE)?;
        check_range(
            "dhcp.validate_timeout",
            self.validate_timeout,
            Self::VALIDATE_TIMEOUT_RANGE,
        )?;
        if self.server_port == 0 || self.client_port == 0 {
            return Err(Error::InvalidConfig("dhcp.port", 0));
        }
        Ok(())
    }
}

impl Default for DhcpCfg {
    fn default() -> DhcpCfg {
        DhcpCfg {
            server_port: 67,
            client_port: 68,
            retry_max: 3,
            timeout: 5,
            validate_addr: true,
            validate_timeout: 1,
            link_local_fallback: false,
        }
    }
}

// ===== impl AutoIpCfg =====

impl AutoIpCfg {
    pub const COUNT_RANGE: RangeInclusive<u64> = 1..=10;
    pub const INTERVAL_RANGE: RangeInclusive<u64> = 1..=10;
    pub const MAX_CONFLICTS_RANGE: RangeInclusive<u64> = 1..=50;

    fn validate(&self) -> Result<(), Error> {
        check_range("autoip.probe_num", self.probe_num, Self::COUNT_RANGE)?;
        check_range(
            "autoip.probe_interval",
            self.probe_interval,
            Self::INTERVAL_RANGE,
        )?;
        check_range(
            "autoip.announce_num",
            self.announce_num,
            Self::COUNT_RANGE,
        )?;
        check_range(
            "autoip.announce_interval",
            self.announce_interval,
            Self::INTERVAL_RANGE,
        )?;
        check_range(
            "autoip.max_conflicts",
            self.max_conflicts,
            Self::MAX_CONFLICTS_RANGE,
        )
    }
}

impl Default for AutoIpCfg {
    fn default() -> AutoIpCfg {
        AutoIpCfg {
            probe_num: 3,
            probe_interval: 1,
            announce_num: 2,
            announce_interval: 2,
            max_conflicts: 10,
        }
    }
}

// ===== impl Logging =====

impl Default for Logging {
    fn default() -> Logging {
        Logging {
            filter: "netcore=debug".to_owned(),
            file: Default::default(),
            stdout: Default::default(),
        }
    }
}

// ===== impl LoggingFile =====

impl Default for LoggingFile {
    fn default() -> LoggingFile {
        LoggingFile {
            enabled: false,
            dir: "/var/log".to_owned(),
            name: "netcore.log".to_owned(),
            rotation: Default::default(),
            fmt: Default::default(),
        }
    }
}

// ===== impl LoggingStdout =====

impl Default for LoggingStdout {
    fn default() -> LoggingStdout {
        LoggingStdout {
            enabled: true,
            fmt: LoggingFmt {
                style: LoggingFmtStyle::Compact,
                ..Default::default()
            },
        }
    }
}

// ===== impl LoggingFmt =====

impl Default for LoggingFmt {
    fn default() -> LoggingFmt {
        LoggingFmt {
            style: LoggingFmtStyle::Full,
            colors: false,
            show_thread_id: false,
            show_source: false,
        }
    }
}

// ===== impl ConfigError =====

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read(..) => {
                write!(f, "failed to read configuration file")
            }
            ConfigError::Parse(..) => {
                write!(f, "failed to parse configuration file")
            }
            ConfigError::Invalid(..) => {
                write!(f, "invalid configuration")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read(error) => Some(error),
            ConfigError::Parse(error) => Some(error),
            ConfigError::Invalid(error) => Some(error),
        }
    }
}

// ===== global functions =====

pub(crate) fn check_range(
    name: &'static str,
    value: impl Into<u64>,
    range: RangeInclusive<u64>,
) -> Result<(), Error> {
    let value = value.into();
    if !range.contains(&value) {
        return Err(Error::InvalidConfig(name, value));
    }
    Ok(())
}
