//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use const_addrs::ip4;
use netcore::error::Error;
use netcore::ipv4::AddrCfgMode;

use super::Fixture;

const MASK24: Ipv4Addr = ip4!("255.255.255.0");

#[tokio::test(start_paused = true)]
async fn add_and_query() {
    let fx = Fixture::new();
    let host = ip4!("192.168.1.10");
    let gw = ip4!("192.168.1.1");
    fx.stack().ipv4_add(fx.if_nbr, host, MASK24, Some(gw)).unwrap();

    let stack = fx.stack();
    assert!(stack.is_cfgd(&host));
    assert!(!stack.is_cfgd(&ip4!("192.168.1.11")));
    assert_eq!(stack.get_addr_subnet_mask(&host).unwrap(), MASK24);
    assert_eq!(stack.get_addr_dflt_gateway(&host).unwrap(), Some(gw));
    assert!(stack.is_subnet_bcast(&ip4!("192.168.1.255")));
    assert!(!stack.is_subnet_bcast(&ip4!("192.168.2.255")));

    let iface = stack.interface(fx.if_nbr).unwrap();
    assert_eq!(iface.ipv4.cfg_mode(), AddrCfgMode::Static);
    let obj = iface.ipv4.get(&host).unwrap();
    assert_eq!(obj.subnet(), ip4!("192.168.1.0"));
    assert_eq!(obj.host_mask, ip4!("0.0.0.255"));
}

#[tokio::test(start_paused = true)]
async fn invalid_addresses() {
    let fx = Fixture::new();
    let mut stack = fx.stack();

    // Non-contiguous mask.
    let result =
        stack.ipv4_add(fx.if_nbr, ip4!("10.0.0.1"), ip4!("255.0.255.0"), None);
    assert!(matches!(result, Err(Error::InvalidSubnetMask(_))));

    // Network and broadcast addresses.
    let result = stack.ipv4_add(fx.if_nbr, ip4!("10.0.0.0"), MASK24, None);
    assert!(matches!(result, Err(Error::InvalidAddrHost(_))));
    let result = stack.ipv4_add(fx.if_nbr, ip4!("10.0.0.255"), MASK24, None);
    assert!(matches!(result, Err(Error::InvalidAddrHost(_))));

    // Multicast and loopback hosts.
    let result = stack.ipv4_add(fx.if_nbr, ip4!("224.0.0.5"), MASK24, None);
    assert!(matches!(result, Err(Error::InvalidAddrHost(_))));
    let result = stack.ipv4_add(fx.if_nbr, ip4!("127.0.0.1"), MASK24, None);
    assert!(matches!(result, Err(Error::InvalidAddrHost(_))));

    // Gateway outside the subnet, or equal to the host.
    let host = ip4!("10.0.0.1");
    let gw = ip4!("10.0.1.1");
    let result = stack.ipv4_add(fx.if_nbr, host, MASK24, Some(gw));
    assert!(matches!(result, Err(Error::InvalidGateway(_))));
    let result = stack.ipv4_add(fx.if_nbr, host, MASK24, Some(host));
    assert!(matches!(result, Err(Error::InvalidGateway(_))));

    assert!(stack.interface(fx.if_nbr).unwrap().ipv4.is_empty());
}

#[tokio::test(start_paused = true)]
async fn point_to_point_prefixes() {
    let fx = Fixture::new();
    let mut stack = fx.stack();

    let mask31 = ip4!("255.255.255.254");
    stack
        .ipv4_add(fx.if_nbr, ip4!("10.0.0.0"), mask31, None)
        .unwrap();
    stack
        .ipv4_add(fx.if_nbr, ip4!("10.1.0.7"), ip4!("255.255.255.255"), None)
        .unwrap();

    // /31 subnets have no directed broadcast.
    assert!(!stack.is_subnet_bcast(&ip4!("10.0.0.1")));
}

#[tokio::test(start_paused = true)]
async fn duplicate_and_table_full() {
    let fx = Fixture::new();
    let mut stack = fx.stack();

    for i in 1..=4 {
        let host = Ipv4Addr::new(192, 168, 1, i);
        stack.ipv4_add(fx.if_nbr, host, MASK24, None).unwrap();
    }
    let result = stack.ipv4_add(fx.if_nbr, ip4!("192.168.1.1"), MASK24, None);
    assert!(matches!(result, Err(Error::AddrDuplicate(_, _))));
    let result = stack.ipv4_add(fx.if_nbr, ip4!("192.168.1.5"), MASK24, None);
    assert!(matches!(result, Err(Error::AddrTableFull(_))));
}

#[tokio::test(start_paused = true)]
async fn address_in_use_elsewhere() {
    let fx = Fixture::new();
    let (eth1, _dev) = fx.add_interface("eth1", [0x02, 0, 0, 0, 0, 0x11]);
    let host = ip4!("192.168.1.10");
    fx.stack().ipv4_add(fx.if_nbr, host, MASK24, None).unwrap();

    let result = fx.stack().ipv4_add(eth1, host, MASK24, None);
    assert!(matches!(
        result,
        Err(Error::AddrInUse(if_nbr, _)) if if_nbr == fx.if_nbr
    ));
}

#[tokio::test(start_paused = true)]
async fn get_hosts() {
    let fx = Fixture::new();
    let mut stack = fx.stack();
    stack
        .ipv4_add(fx.if_nbr, ip4!("192.168.1.10"), MASK24, None)
        .unwrap();
    stack
        .ipv4_add(fx.if_nbr, ip4!("10.0.0.10"), ip4!("255.0.0.0"), None)
        .unwrap();

    let mut out = [Ipv4Addr::UNSPECIFIED; 4];
    let count = stack.ipv4_get_hosts(fx.if_nbr, &mut out).unwrap();
    assert_eq!(count, 2);
    assert_eq!(out[..2], [ip4!("192.168.1.10"), ip4!("10.0.0.10")]);

    let mut small = [Ipv4Addr::UNSPECIFIED; 1];
    let result = stack.ipv4_get_hosts(fx.if_nbr, &mut small);
    assert!(matches!(result, Err(Error::AddrTableSize(2))));
}

#[tokio::test(start_paused = true)]
async fn remove() {
    let fx = Fixture::new();
    let mut stack = fx.stack();
    let host = ip4!("192.168.1.10");
    stack.ipv4_add(fx.if_nbr, host, MASK24, None).unwrap();

    stack.ipv4_remove(fx.if_nbr, &host).unwrap();
    assert!(!stack.is_cfgd(&host));
    assert_eq!(
        stack.interface(fx.if_nbr).unwrap().ipv4.cfg_mode(),
        AddrCfgMode::None
    );
    let result = stack.ipv4_remove(fx.if_nbr, &host);
    assert!(matches!(result, Err(Error::AddrNotFound(_))));

    stack.ipv4_add(fx.if_nbr, host, MASK24, None).unwrap();
    stack
        .ipv4_add(fx.if_nbr, ip4!("192.168.1.11"), MASK24, None)
        .unwrap();
    stack.ipv4_remove_all(fx.if_nbr).unwrap();
    assert!(stack.interface(fx.if_nbr).unwrap().ipv4.is_empty());
}

#[tokio::test(start_paused = true)]
async fn source_selection() {
    let fx = Fixture::new();
    let (eth1, _dev) = fx.add_interface("eth1", [0x02, 0, 0, 0, 0, 0x11]);
    let mut stack = fx.stack();

    assert_eq!(stack.ipv4_get_source_for(&ip4!("8.8.8.8")), None);

    stack
        .ipv4_add(fx.if_nbr, ip4!("192.168.1.10"), MASK24, None)
        .unwrap();
    stack
        .ipv4_add(eth1, ip4!("10.0.0.10"), ip4!("255.0.0.0"), None)
        .unwrap();

    // Subnet matches win, on any interface.
    assert_eq!(
        stack.ipv4_get_source_for(&ip4!("10.2.3.4")),
        Some(ip4!("10.0.0.10"))
    );
    assert_eq!(
        stack.ipv4_get_source_for(&ip4!("192.168.1.77")),
        Some(ip4!("192.168.1.10"))
    );
    // Otherwise the first interface with an address.
    assert_eq!(
        stack.ipv4_get_source_for(&ip4!("8.8.8.8")),
        Some(ip4!("192.168.1.10"))
    );

    // Interfaces that are down are skipped.
    assert!(fx.dev.is_started());
    stack.if_stop(fx.if_nbr).unwrap();
    assert!(!fx.dev.is_started());
    assert_eq!(
        stack.ipv4_get_source_for(&ip4!("8.8.8.8")),
        Some(ip4!("10.0.0.10"))
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_interface() {
    let fx = Fixture::new();
    let result = fx.stack().ipv4_add(99, ip4!("192.168.1.10"), MASK24, None);
    assert!(matches!(result, Err(Error::InterfaceNotFound(99))));
}
