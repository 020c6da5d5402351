//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod arp;
pub mod autoip;
pub mod buffer;
pub mod config;
pub mod conn;
pub mod debug;
pub mod device;
pub mod dhcp;
pub mod error;
pub mod events;
pub mod hook;
pub mod icmp;
pub mod igmp;
pub mod interface;
pub mod ipv4;
pub mod ipv6;
pub mod logging;
pub mod mcast;
pub mod mld;
pub mod ndp;
pub mod packet;
pub mod stack;
pub mod stat;
pub mod tasks;

pub use stack::Stack;
