//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

// Ethernet.
pub const ETHERTYPE_IPV6: u16 = 0x86dd;
pub const ETHERNET_HDR_LENGTH: usize = 14;

// IPv6.
pub const IPV6_VERSION: u8 = 6;
pub const IPV6_HDR_LENGTH: usize = 40;
pub const IPV6_NEXT_HEADER_ICMPV6: u8 = 58;
// Hop limit of every ND message (RFC 4861, section 6.1.1 and 7.1.1).
pub const ND_HOP_LIMIT: u8 = 255;

// Offsets inside a frame.
pub const ETHERTYPE_OFFSET: usize = 12;
pub const IPV6_NEXT_HEADER_OFFSET: usize = ETHERNET_HDR_LENGTH + 6;
pub const ICMPV6_OFFSET: usize = ETHERNET_HDR_LENGTH + IPV6_HDR_LENGTH;
pub const ICMPV6_CKSUM_RANGE: std::ops::Range<usize> =
    ICMPV6_OFFSET + 2..ICMPV6_OFFSET + 4;

// ICMPv6 fixed message lengths (header included, options excluded).
pub const ICMPV6_RS_LENGTH: usize = 8;
pub const ICMPV6_RA_LENGTH: usize = 16;
pub const ICMPV6_NS_LENGTH: usize = 24;
pub const ICMPV6_NA_LENGTH: usize = 24;

// ND option lengths, in bytes.
pub const ND_OPT_LLA_LENGTH: usize = 8;
pub const ND_OPT_PREFIX_INFO_LENGTH: usize = 32;
pub const ND_OPT_MTU_LENGTH: usize = 8;

// Router advertisement defaults.
pub const DFLT_RA_INTERVAL: u64 = 60;
pub const DFLT_ROUTER_LIFETIME: u16 = 4500;
pub const DFLT_CUR_HOP_LIMIT: u8 = 64;
pub const DFLT_REACHABLE_TIME: u32 = 120000;
pub const DFLT_RETRANS_TIMER: u32 = 0;
pub const DFLT_PREFIX_VALID_LIFETIME: u32 = 2592000;
pub const DFLT_PREFIX_PREFERRED_LIFETIME: u32 = 604800;
// Advertised prefixes are /64 (EUI-64 interface identifiers).
pub const PREFIX_LENGTH: u8 = 64;

// Packet workers.
pub const DFLT_WORKER_COUNT: usize = 4;
pub const DFLT_PACKET_QUEUE_SIZE: usize = 1024;

// Device owner of router interface ports.
pub const DEVICE_OWNER_ROUTER_INTF: &str = "network:router_interface";
pub const DEVICE_OWNER_DVR_INTF: &str =
    "network:router_interface_distributed";
