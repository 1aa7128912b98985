//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut, TryGetError};
use derive_new::new;
use enum_as_inner::EnumAsInner;
use holo_utils::bytes::{BytesExt, BytesMutExt};
use holo_utils::mac_addr::MacAddr;
use internet_checksum::Checksum;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::consts::*;

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;

//
// Ethernet + IPv6 framing of every ND message.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     Destination MAC (6)                       |
// +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                               |                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
// |                        Source MAC (6)                         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |       Ethertype (86dd)        |Version| Traffic Class |  Flow  |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |          Flow Label           |        Payload Length         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  Next Header  |   Hop Limit   |                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
// |                    Source Address (16)                        |
// |                 Destination Address (16)                      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |     Code      |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                      Message body ...                         |
//
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Frame {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: Ipv6Addr,
    pub dst_ip: Ipv6Addr,
    #[new(default)]
    pub traffic_class: u8,
    #[new(default)]
    pub flow_label: u32,
    pub packet: Packet,
}

// ND messages.
#[derive(Clone, Debug, EnumAsInner, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Packet {
    RouterSolicitation(RouterSolicitation),
    RouterAdvertisement(RouterAdvertisement),
    NeighborSolicitation(NeighborSolicitation),
    NeighborAdvertisement(NeighborAdvertisement),
}

// ICMPv6 message types handled by the ND engine.
//
// IANA registry:
// https://www.iana.org/assignments/icmpv6-parameters/icmpv6-parameters.xhtml#icmpv6-parameters-2
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MessageType {
    RouterSolicitation = 133,
    RouterAdvertisement = 134,
    NeighborSolicitation = 135,
    NeighborAdvertisement = 136,
}

// Inbound ND messages that are punted to the controller for processing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IcmpV6Kind {
    NeighborSolicitation,
    RouterSolicitation,
}

// ND option types.
//
// IANA registry:
// https://www.iana.org/assignments/icmpv6-parameters/icmpv6-parameters.xhtml#icmpv6-parameters-5
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
pub enum OptionType {
    SourceLinkLayerAddr = 1,
    TargetLinkLayerAddr = 2,
    PrefixInformation = 3,
    RedirectedHeader = 4,
    Mtu = 5,
}

// Router advertisement flags.
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct RaFlags: u8 {
        const MANAGED = 0x80;
        const OTHER = 0x40;
    }
}

// Neighbor advertisement flags (most significant byte of the flags word).
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct NaFlags: u8 {
        const ROUTER = 0x80;
        const SOLICITED = 0x40;
        const OVERRIDE = 0x20;
    }
}

// Prefix information option flags.
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct PrefixFlags: u8 {
        const ON_LINK = 0x80;
        const AUTONOMOUS = 0x40;
    }
}

//
// Router Solicitation.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |     Code      |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                            Reserved                           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   Options ...
// +-+-+-+-+-+-+-+-+-+-+-+-
//
#[derive(Clone, Debug, Default, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouterSolicitation {
    pub source_ll_addr: Option<MacAddr>,
}

//
// Router Advertisement.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |     Code      |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | Cur Hop Limit |M|O|  Reserved |       Router Lifetime         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                         Reachable Time                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          Retrans Timer                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   Options ...
// +-+-+-+-+-+-+-+-+-+-+-+-
//
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouterAdvertisement {
    pub cur_hop_limit: u8,
    pub flags: RaFlags,
    pub router_lifetime: u16,
    pub reachable_time: u32,
    pub retrans_timer: u32,
    pub source_ll_addr: Option<MacAddr>,
    pub mtu: Option<u32>,
    pub prefixes: Vec<PrefixInfo>,
}

//
// Neighbor Solicitation.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |     Code      |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                           Reserved                            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                       Target Address (16)                     +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   Options ...
// +-+-+-+-+-+-+-+-+-+-+-+-
//
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NeighborSolicitation {
    pub target: Ipv6Addr,
    pub source_ll_addr: Option<MacAddr>,
}

//
// Neighbor Advertisement.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |     Code      |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |R|S|O|                     Reserved                            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                       Target Address (16)                     +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   Options ...
// +-+-+-+-+-+-+-+-+-+-+-+-
//
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NeighborAdvertisement {
    pub flags: NaFlags,
    pub target: Ipv6Addr,
    pub target_ll_addr: Option<MacAddr>,
}

//
// Prefix Information option.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |    Length     | Prefix Length |L|A| Reserved1 |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                         Valid Lifetime                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Preferred Lifetime                      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                           Reserved2                           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                          Prefix (16)                          +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PrefixInfo {
    pub prefix_len: u8,
    pub flags: PrefixFlags,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
    pub prefix: Ipv6Addr,
}

// Decoded ND option.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum NdOption {
    SourceLinkLayerAddr(MacAddr),
    TargetLinkLayerAddr(MacAddr),
    PrefixInformation(PrefixInfo),
    Mtu(u32),
    Unknown(u8),
}

// ND decode errors.
#[derive(Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DecodeError {
    InsufficientData,
    InvalidEthertype(u16),
    InvalidIpVersion(u8),
    InvalidNextHeader(u8),
    InvalidHopLimit(u8),
    InvalidLength(usize),
    InvalidChecksum(u16),
    UnknownMessageType(u8),
    UnexpectedMessageType(MessageType),
    InvalidCode(u8),
    InvalidOptionLength(u8),
    InvalidTarget(Ipv6Addr),
    ReadOutOfBounds,
}

// ===== impl Frame =====

impl Frame {
    // Encodes the frame into a bytes buffer.
    //
    // The IPv6 payload length and the ICMPv6 checksum are patched in place
    // once the whole message has been written.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(128);

        // Ethernet header.
        buf.put_mac(&self.dst_mac);
        buf.put_mac(&self.src_mac);
        buf.put_u16(ETHERTYPE_IPV6);

        // IPv6 header.
        buf.put_u32(
            ((IPV6_VERSION as u32) << 28)
                | ((self.traffic_class as u32) << 20)
                | (self.flow_label & 0x000f_ffff),
        );
        // The payload length will be initialized later.
        buf.put_u16(0);
        buf.put_u8(IPV6_NEXT_HEADER_ICMPV6);
        buf.put_u8(ND_HOP_LIMIT);
        buf.put_ipv6(&self.src_ip);
        buf.put_ipv6(&self.dst_ip);

        // ICMPv6 message.
        self.packet.encode(&mut buf);

        // Initialize payload length.
        let payload_len = (buf.len() - ICMPV6_OFFSET) as u16;
        buf[ETHERNET_HDR_LENGTH + 4..ETHERNET_HDR_LENGTH + 6]
            .copy_from_slice(&payload_len.to_be_bytes());

        // Initialize checksum.
        let cksum =
            compute_checksum(&self.src_ip, &self.dst_ip, &buf[ICMPV6_OFFSET..]);
        buf[ICMPV6_CKSUM_RANGE].copy_from_slice(&cksum.to_be_bytes());

        buf.freeze()
    }

    // Decodes a full Ethernet frame carrying an ND message.
    //
    // The ICMPv6 checksum is verified before the message body is parsed.
    pub fn decode(data: &[u8]) -> DecodeResult<Self> {
        if data.len() < ICMPV6_OFFSET + 4 {
            return Err(DecodeError::InsufficientData);
        }
        let mut buf = Bytes::copy_from_slice(data);

        // Ethernet header.
        let dst_mac = buf.try_get_mac()?;
        let src_mac = buf.try_get_mac()?;
        let ethertype = buf.try_get_u16()?;
        if ethertype != ETHERTYPE_IPV6 {
            return Err(DecodeError::InvalidEthertype(ethertype));
        }

        // IPv6 header.
        let ver_tc_fl = buf.try_get_u32()?;
        let version = (ver_tc_fl >> 28) as u8;
        if version != IPV6_VERSION {
            return Err(DecodeError::InvalidIpVersion(version));
        }
        let traffic_class = ((ver_tc_fl >> 20) & 0xff) as u8;
        let flow_label = ver_tc_fl & 0x000f_ffff;
        let payload_len = buf.try_get_u16()? as usize;
        let next_header = buf.try_get_u8()?;
        if next_header != IPV6_NEXT_HEADER_ICMPV6 {
            return Err(DecodeError::InvalidNextHeader(next_header));
        }
        let hop_limit = buf.try_get_u8()?;
        if hop_limit != ND_HOP_LIMIT {
            return Err(DecodeError::InvalidHopLimit(hop_limit));
        }
        let src_ip = buf.try_get_ipv6()?;
        let dst_ip = buf.try_get_ipv6()?;

        // Anything past the IPv6 payload is Ethernet padding.
        if payload_len < 4 || payload_len > buf.remaining() {
            return Err(DecodeError::InvalidLength(payload_len));
        }
        let icmp = buf.split_to(payload_len);

        // Validate checksum.
        let stored = u16::from_be_bytes([icmp[2], icmp[3]]);
        if !validate_checksum(&src_ip, &dst_ip, &icmp, stored) {
            return Err(DecodeError::InvalidChecksum(stored));
        }

        let packet = Packet::decode(icmp)?;

        Ok(Frame {
            src_mac,
            dst_mac,
            src_ip,
            dst_ip,
            traffic_class,
            flow_label,
            packet,
        })
    }
}

// ===== impl Packet =====

impl Packet {
    pub fn message_type(&self) -> MessageType {
        match self {
            Packet::RouterSolicitation(_) => MessageType::RouterSolicitation,
            Packet::RouterAdvertisement(_) => MessageType::RouterAdvertisement,
            Packet::NeighborSolicitation(_) => {
                MessageType::NeighborSolicitation
            }
            Packet::NeighborAdvertisement(_) => {
                MessageType::NeighborAdvertisement
            }
        }
    }

    // Encodes the ICMPv6 message, leaving the checksum zeroed.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.message_type() as u8);
        buf.put_u8(0);
        buf.put_u16(0);

        match self {
            Packet::RouterSolicitation(msg) => msg.encode(buf),
            Packet::RouterAdvertisement(msg) => msg.encode(buf),
            Packet::NeighborSolicitation(msg) => msg.encode(buf),
            Packet::NeighborAdvertisement(msg) => msg.encode(buf),
        }
    }

    // Decodes an ICMPv6 message whose checksum was already verified.
    pub fn decode(mut buf: Bytes) -> DecodeResult<Self> {
        let length = buf.len();
        let msg_type = buf.try_get_u8()?;
        let code = buf.try_get_u8()?;
        let _cksum = buf.try_get_u16()?;

        let Some(msg_type) = MessageType::from_u8(msg_type) else {
            return Err(DecodeError::UnknownMessageType(msg_type));
        };
        if code != 0 {
            return Err(DecodeError::InvalidCode(code));
        }
        if length < msg_type.min_length() {
            return Err(DecodeError::InvalidLength(length));
        }

        let packet = match msg_type {
            MessageType::RouterSolicitation => Packet::RouterSolicitation(
                RouterSolicitation::decode(&mut buf)?,
            ),
            MessageType::RouterAdvertisement => Packet::RouterAdvertisement(
                RouterAdvertisement::decode(&mut buf)?,
            ),
            MessageType::NeighborSolicitation => Packet::NeighborSolicitation(
                NeighborSolicitation::decode(&mut buf)?,
            ),
            MessageType::NeighborAdvertisement => {
                Packet::NeighborAdvertisement(NeighborAdvertisement::decode(
                    &mut buf,
                )?)
            }
        };

        Ok(packet)
    }
}

// ===== impl MessageType =====

impl MessageType {
    // Minimum ICMPv6 length of the message (RFC 4861, sections 6.1 and 7.1).
    pub fn min_length(&self) -> usize {
        match self {
            MessageType::RouterSolicitation => ICMPV6_RS_LENGTH,
            MessageType::RouterAdvertisement => ICMPV6_RA_LENGTH,
            MessageType::NeighborSolicitation => ICMPV6_NS_LENGTH,
            MessageType::NeighborAdvertisement => ICMPV6_NA_LENGTH,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::RouterSolicitation => write!(f, "router-solicitation"),
            MessageType::RouterAdvertisement => {
                write!(f, "router-advertisement")
            }
            MessageType::NeighborSolicitation => {
                write!(f, "neighbor-solicitation")
            }
            MessageType::NeighborAdvertisement => {
                write!(f, "neighbor-advertisement")
            }
        }
    }
}

// ===== impl RouterSolicitation =====

impl RouterSolicitation {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(0);
        if let Some(mac) = &self.source_ll_addr {
            encode_lla_option(buf, OptionType::SourceLinkLayerAddr, mac);
        }
    }

    fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let _reserved = buf.try_get_u32()?;

        // Options are only present past the fixed part of the message.
        let mut source_ll_addr = None;
        if buf.has_remaining() {
            for option in decode_options(buf)? {
                if let NdOption::SourceLinkLayerAddr(mac) = option {
                    source_ll_addr = Some(mac);
                }
            }
        }

        Ok(RouterSolicitation { source_ll_addr })
    }
}

// ===== impl RouterAdvertisement =====

impl RouterAdvertisement {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.cur_hop_limit);
        buf.put_u8(self.flags.bits());
        buf.put_u16(self.router_lifetime);
        buf.put_u32(self.reachable_time);
        buf.put_u32(self.retrans_timer);
        if let Some(mac) = &self.source_ll_addr {
            encode_lla_option(buf, OptionType::SourceLinkLayerAddr, mac);
        }
        if let Some(mtu) = self.mtu {
            buf.put_u8(OptionType::Mtu as u8);
            buf.put_u8((ND_OPT_MTU_LENGTH / 8) as u8);
            buf.put_u16(0);
            buf.put_u32(mtu);
        }
        for prefix in &self.prefixes {
            prefix.encode(buf);
        }
    }

    fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let cur_hop_limit = buf.try_get_u8()?;
        let flags = RaFlags::from_bits_truncate(buf.try_get_u8()?);
        let router_lifetime = buf.try_get_u16()?;
        let reachable_time = buf.try_get_u32()?;
        let retrans_timer = buf.try_get_u32()?;

        let mut ra = RouterAdvertisement {
            cur_hop_limit,
            flags,
            router_lifetime,
            reachable_time,
            retrans_timer,
            ..Default::default()
        };
        for option in decode_options(buf)? {
            match option {
                NdOption::SourceLinkLayerAddr(mac) => {
                    ra.source_ll_addr = Some(mac)
                }
                NdOption::Mtu(mtu) => ra.mtu = Some(mtu),
                NdOption::PrefixInformation(prefix) => ra.prefixes.push(prefix),
                _ => (),
            }
        }

        Ok(ra)
    }
}

// ===== impl NeighborSolicitation =====

impl NeighborSolicitation {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(0);
        buf.put_ipv6(&self.target);
        if let Some(mac) = &self.source_ll_addr {
            encode_lla_option(buf, OptionType::SourceLinkLayerAddr, mac);
        }
    }

    fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let _reserved = buf.try_get_u32()?;
        let target = buf.try_get_ipv6()?;
        if target.is_multicast() {
            return Err(DecodeError::InvalidTarget(target));
        }

        let mut source_ll_addr = None;
        for option in decode_options(buf)? {
            if let NdOption::SourceLinkLayerAddr(mac) = option {
                source_ll_addr = Some(mac);
            }
        }

        Ok(NeighborSolicitation {
            target,
            source_ll_addr,
        })
    }
}

// ===== impl NeighborAdvertisement =====

impl NeighborAdvertisement {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.flags.bits());
        buf.put_zeroes(3);
        buf.put_ipv6(&self.target);
        if let Some(mac) = &self.target_ll_addr {
            encode_lla_option(buf, OptionType::TargetLinkLayerAddr, mac);
        }
    }

    fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let flags = NaFlags::from_bits_truncate(buf.try_get_u8()?);
        let _reserved = buf.try_get_uint(3)?;
        let target = buf.try_get_ipv6()?;
        if target.is_multicast() {
            return Err(DecodeError::InvalidTarget(target));
        }

        let mut target_ll_addr = None;
        for option in decode_options(buf)? {
            if let NdOption::TargetLinkLayerAddr(mac) = option {
                target_ll_addr = Some(mac);
            }
        }

        Ok(NeighborAdvertisement {
            flags,
            target,
            target_ll_addr,
        })
    }
}

// ===== impl PrefixInfo =====

impl PrefixInfo {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(OptionType::PrefixInformation as u8);
        buf.put_u8((ND_OPT_PREFIX_INFO_LENGTH / 8) as u8);
        buf.put_u8(self.prefix_len);
        buf.put_u8(self.flags.bits());
        buf.put_u32(self.valid_lifetime);
        buf.put_u32(self.preferred_lifetime);
        buf.put_u32(0);
        buf.put_ipv6(&self.prefix);
    }

    fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let prefix_len = buf.try_get_u8()?;
        let flags = PrefixFlags::from_bits_truncate(buf.try_get_u8()?);
        let valid_lifetime = buf.try_get_u32()?;
        let preferred_lifetime = buf.try_get_u32()?;
        let _reserved = buf.try_get_u32()?;
        let prefix = buf.try_get_ipv6()?;

        Ok(PrefixInfo {
            prefix_len,
            flags,
            valid_lifetime,
            preferred_lifetime,
            prefix,
        })
    }
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InsufficientData => {
                write!(f, "not enough data")
            }
            DecodeError::InvalidEthertype(ethertype) => {
                write!(f, "invalid ethertype: {ethertype:#06x}")
            }
            DecodeError::InvalidIpVersion(version) => {
                write!(f, "invalid IP version: {version}")
            }
            DecodeError::InvalidNextHeader(next_header) => {
                write!(f, "invalid next header: {next_header}")
            }
            DecodeError::InvalidHopLimit(hop_limit) => {
                write!(f, "invalid hop limit: {hop_limit}")
            }
            DecodeError::InvalidLength(length) => {
                write!(f, "invalid length: {length}")
            }
            DecodeError::InvalidChecksum(cksum) => {
                write!(f, "invalid checksum: {cksum:#06x}")
            }
            DecodeError::UnknownMessageType(msg_type) => {
                write!(f, "unknown message type: {msg_type}")
            }
            DecodeError::UnexpectedMessageType(msg_type) => {
                write!(f, "unexpected message type: {msg_type}")
            }
            DecodeError::InvalidCode(code) => {
                write!(f, "invalid code: {code}")
            }
            DecodeError::InvalidOptionLength(opt_type) => {
                write!(f, "invalid length in option {opt_type}")
            }
            DecodeError::InvalidTarget(target) => {
                write!(f, "invalid target address: {target}")
            }
            DecodeError::ReadOutOfBounds => {
                write!(f, "attempt to read out of bounds")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<TryGetError> for DecodeError {
    fn from(_error: TryGetError) -> DecodeError {
        DecodeError::ReadOutOfBounds
    }
}

// ===== global functions =====

// Returns the kind of ND message carried by the frame, if it's one that the
// controller answers. Everything else (non-IPv6, non-ICMPv6, other ICMPv6
// types) is ignored.
pub fn classify(data: &[u8]) -> Option<IcmpV6Kind> {
    if data.len() <= ICMPV6_OFFSET {
        return None;
    }
    let ethertype = u16::from_be_bytes([
        data[ETHERTYPE_OFFSET],
        data[ETHERTYPE_OFFSET + 1],
    ]);
    if ethertype != ETHERTYPE_IPV6
        || data[IPV6_NEXT_HEADER_OFFSET] != IPV6_NEXT_HEADER_ICMPV6
    {
        return None;
    }

    match MessageType::from_u8(data[ICMPV6_OFFSET]) {
        Some(MessageType::NeighborSolicitation) => {
            Some(IcmpV6Kind::NeighborSolicitation)
        }
        Some(MessageType::RouterSolicitation) => {
            Some(IcmpV6Kind::RouterSolicitation)
        }
        _ => None,
    }
}

// Decodes a frame that must carry a neighbor solicitation.
pub fn decode_ns(data: &[u8]) -> DecodeResult<Frame> {
    decode_expecting(data, MessageType::NeighborSolicitation)
}

// Decodes a frame that must carry a router solicitation.
pub fn decode_rs(data: &[u8]) -> DecodeResult<Frame> {
    decode_expecting(data, MessageType::RouterSolicitation)
}

// Computes the ICMPv6 checksum (RFC 4443, section 2.3).
//
// The sum covers the IPv6 pseudo-header followed by the ICMPv6 message, with
// the message's own checksum field taken as zero.
pub fn compute_checksum(src: &Ipv6Addr, dst: &Ipv6Addr, icmp: &[u8]) -> u16 {
    let mut cksum = Checksum::new();
    cksum.add_bytes(&src.octets());
    cksum.add_bytes(&dst.octets());
    cksum.add_bytes(&(icmp.len() as u32).to_be_bytes());
    cksum.add_bytes(&[0, 0, 0, IPV6_NEXT_HEADER_ICMPV6]);
    if icmp.len() >= 4 {
        cksum.add_bytes(&icmp[..2]);
        cksum.add_bytes(&icmp[4..]);
    } else {
        cksum.add_bytes(icmp);
    }
    u16::from_be_bytes(cksum.checksum())
}

// Returns true if the stored checksum matches the one computed over the
// message.
pub fn validate_checksum(
    src: &Ipv6Addr,
    dst: &Ipv6Addr,
    icmp: &[u8],
    stored: u16,
) -> bool {
    compute_checksum(src, dst, icmp) == stored
}

fn decode_expecting(
    data: &[u8],
    expected: MessageType,
) -> DecodeResult<Frame> {
    let frame = Frame::decode(data)?;
    let msg_type = frame.packet.message_type();
    if msg_type != expected {
        return Err(DecodeError::UnexpectedMessageType(msg_type));
    }
    Ok(frame)
}

fn encode_lla_option(buf: &mut BytesMut, opt_type: OptionType, mac: &MacAddr) {
    buf.put_u8(opt_type as u8);
    buf.put_u8((ND_OPT_LLA_LENGTH / 8) as u8);
    buf.put_mac(mac);
}

fn decode_options(buf: &mut Bytes) -> DecodeResult<Vec<NdOption>> {
    let mut options = vec![];

    while buf.remaining() >= 2 {
        let opt_type = buf.try_get_u8()?;
        let opt_len = buf.try_get_u8()?;

        // A zero length option must cause the whole message to be discarded
        // (RFC 4861, section 4.6).
        let body_len = (opt_len as usize * 8).saturating_sub(2);
        if opt_len == 0 || body_len > buf.remaining() {
            return Err(DecodeError::InvalidOptionLength(opt_type));
        }
        let mut body = buf.split_to(body_len);

        let option = match OptionType::from_u8(opt_type) {
            Some(OptionType::SourceLinkLayerAddr) => {
                NdOption::SourceLinkLayerAddr(body.try_get_mac()?)
            }
            Some(OptionType::TargetLinkLayerAddr) => {
                NdOption::TargetLinkLayerAddr(body.try_get_mac()?)
            }
            Some(OptionType::PrefixInformation) => {
                NdOption::PrefixInformation(PrefixInfo::decode(&mut body)?)
            }
            Some(OptionType::Mtu) => {
                let _reserved = body.try_get_u16()?;
                NdOption::Mtu(body.try_get_u32()?)
            }
            _ => NdOption::Unknown(opt_type),
        };
        options.push(option);
    }

    Ok(options)
}
