//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::{Bytes, BytesMut};
use const_addrs::{ip4, ip6};
use netcore_utils::bytes::{BytesExt, BytesMutExt};
use netcore_utils::mac_addr::MacAddr;

const MAC1: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

#[test]
fn multicast_mapping() {
    assert_eq!(
        MacAddr::from_ipv4_mcast(&ip4!("224.0.0.1")),
        MacAddr::from([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01])
    );
    // The high-order bit of the second group octet is not mapped.
    assert_eq!(
        MacAddr::from_ipv4_mcast(&ip4!("239.129.1.2")),
        MacAddr::from([0x01, 0x00, 0x5e, 0x01, 0x01, 0x02])
    );
    assert_eq!(
        MacAddr::from_ipv6_mcast(&ip6!("ff02::1:ff00:1")),
        MacAddr::from([0x33, 0x33, 0xff, 0x00, 0x00, 0x01])
    );
    assert!(MacAddr::from_ipv4_mcast(&ip4!("224.0.0.22")).is_multicast());
    assert!(!MacAddr::from(MAC1).is_multicast());
    assert!(MacAddr::BROADCAST.is_multicast());
}

#[test]
fn link_local_ipv6() {
    let mac = MacAddr::from(MAC1);
    assert_eq!(mac.to_link_local_ipv6(), ip6!("fe80::211:22ff:fe33:4455"));

    let mac = MacAddr::from([0x02, 0, 0, 0, 0, 0x01]);
    assert_eq!(mac.to_link_local_ipv6(), ip6!("fe80::ff:fe00:1"));
}

#[test]
fn parse_and_display() {
    let mac = MacAddr::from(MAC1);
    assert_eq!("00:11:22:33:44:55".parse::<MacAddr>(), Ok(mac));
    assert_eq!("00-11-22-33-44-55".parse::<MacAddr>(), Ok(mac));
    assert!("00:11:22:33:44".parse::<MacAddr>().is_err());
    assert!("00:11:22:33:44:55:66".parse::<MacAddr>().is_err());
    assert!("00:11:22:33:44:5g".parse::<MacAddr>().is_err());
    assert_eq!(mac.to_string(), "00:11:22:33:44:55");
    assert!(MacAddr::UNSPECIFIED.is_unspecified());
}

#[test]
fn buffer_helpers() {
    let mac = MacAddr::from(MAC1);
    let mut buf = BytesMut::new();
    buf.put_mac(&mac);
    buf.put_ipv4(&ip4!("192.0.2.1"));
    buf.put_ipv6(&ip6!("2001:db8::1"));
    assert_eq!(buf.len(), 6 + 4 + 16);

    let mut buf = Bytes::from(buf);
    assert_eq!(buf.get_mac(), mac);
    assert_eq!(buf.get_ipv4(), ip4!("192.0.2.1"));
    assert_eq!(buf.get_ipv6(), ip6!("2001:db8::1"));
}
