//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::LazyLock;

use bytes::Bytes;
use const_addrs::ip6;
use holo_nd::consts::ICMPV6_OFFSET;
use holo_nd::packet::{
    self, DecodeError, Frame, IcmpV6Kind, MessageType, NaFlags,
    NeighborAdvertisement, NeighborSolicitation, Packet, PrefixFlags,
    PrefixInfo, RaFlags, RouterAdvertisement, RouterSolicitation,
};
use holo_utils::mac_addr::MacAddr;

//
// Helper functions.
//

fn test_encode_frame(bytes_expected: &[u8], frame: &Frame) {
    let bytes_actual = frame.encode();
    let bytes_actual: &[u8] = bytes_actual.as_ref();
    assert_eq_hex!(bytes_expected, bytes_actual);
}

fn test_decode_frame(bytes: &[u8], frame_expected: &Frame) {
    let frame_actual = Frame::decode(bytes).unwrap();
    assert_eq!(*frame_expected, frame_actual);
}

//
// Test frames.
//

static RS_UNSPECIFIED: LazyLock<(Vec<u8>, Frame)> = LazyLock::new(|| {
    (
        vec![
            0x33, 0x33, 0x00, 0x00, 0x00, 0x02, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff, 0x86, 0xdd, 0x60, 0x00, 0x00, 0x00, 0x00, 0x08,
            0x3a, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x02,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x02, 0x85, 0x00, 0x7b, 0xb8, 0x00, 0x00,
            0x00, 0x00,
        ],
        Frame::new(
            MacAddr::from([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            MacAddr::from([0x33, 0x33, 0x00, 0x00, 0x00, 0x02]),
            ip6!("::"),
            ip6!("ff02::2"),
            Packet::RouterSolicitation(RouterSolicitation::new(None)),
        ),
    )
});

static RS_SLLA: LazyLock<(Vec<u8>, Frame)> = LazyLock::new(|| {
    (
        vec![
            0x33, 0x33, 0x00, 0x00, 0x00, 0x02, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff, 0x86, 0xdd, 0x60, 0x00, 0x00, 0x00, 0x00, 0x10,
            0x3a, 0xff, 0xfe, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0xa8, 0xbb, 0xcc, 0xff, 0xfe, 0xdd, 0xee, 0xff, 0xff, 0x02,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x02, 0x85, 0x00, 0xb1, 0xfb, 0x00, 0x00,
            0x00, 0x00, 0x01, 0x01, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
        ],
        Frame::new(
            MacAddr::from([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            MacAddr::from([0x33, 0x33, 0x00, 0x00, 0x00, 0x02]),
            ip6!("fe80::a8bb:ccff:fedd:eeff"),
            ip6!("ff02::2"),
            Packet::RouterSolicitation(RouterSolicitation::new(Some(
                MacAddr::from([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            ))),
        ),
    )
});

static NS1: LazyLock<(Vec<u8>, Frame)> = LazyLock::new(|| {
    (
        vec![
            0x33, 0x33, 0xff, 0x00, 0x00, 0x01, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff, 0x86, 0xdd, 0x60, 0x00, 0x00, 0x00, 0x00, 0x20,
            0x3a, 0xff, 0xfe, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0xa8, 0xbb, 0xcc, 0xff, 0xfe, 0xdd, 0xee, 0xff, 0xff, 0x02,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
            0xff, 0x00, 0x00, 0x01, 0x87, 0x00, 0x83, 0x30, 0x00, 0x00,
            0x00, 0x00, 0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0x01,
            0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
        ],
        Frame::new(
            MacAddr::from([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            MacAddr::from([0x33, 0x33, 0xff, 0x00, 0x00, 0x01]),
            ip6!("fe80::a8bb:ccff:fedd:eeff"),
            ip6!("ff02::1:ff00:1"),
            Packet::NeighborSolicitation(NeighborSolicitation::new(
                ip6!("2001:db8::1"),
                Some(MacAddr::from([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])),
            )),
        ),
    )
});

static NA1: LazyLock<(Vec<u8>, Frame)> = LazyLock::new(|| {
    (
        vec![
            0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0xfa, 0x16, 0x3e, 0x00,
            0x00, 0x01, 0x86, 0xdd, 0x60, 0x00, 0x00, 0x00, 0x00, 0x20,
            0x3a, 0xff, 0xfe, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0xf8, 0x16, 0x3e, 0xff, 0xfe, 0x00, 0x00, 0x01, 0xfe, 0x80,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xa8, 0xbb, 0xcc, 0xff,
            0xfe, 0xdd, 0xee, 0xff, 0x88, 0x00, 0x9a, 0x1d, 0xe0, 0x00,
            0x00, 0x00, 0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x01,
            0xfa, 0x16, 0x3e, 0x00, 0x00, 0x01,
        ],
        Frame::new(
            MacAddr::from([0xfa, 0x16, 0x3e, 0x00, 0x00, 0x01]),
            MacAddr::from([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            ip6!("fe80::f816:3eff:fe00:1"),
            ip6!("fe80::a8bb:ccff:fedd:eeff"),
            Packet::NeighborAdvertisement(NeighborAdvertisement::new(
                NaFlags::ROUTER | NaFlags::SOLICITED | NaFlags::OVERRIDE,
                ip6!("2001:db8::1"),
                Some(MacAddr::from([0xfa, 0x16, 0x3e, 0x00, 0x00, 0x01])),
            )),
        ),
    )
});

static RA1: LazyLock<(Vec<u8>, Frame)> = LazyLock::new(|| {
    (
        vec![
            0x33, 0x33, 0x00, 0x00, 0x00, 0x01, 0xfa, 0x16, 0x3e, 0x00,
            0x00, 0x01, 0x86, 0xdd, 0x60, 0x00, 0x00, 0x00, 0x00, 0x40,
            0x3a, 0xff, 0xfe, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0xf8, 0x16, 0x3e, 0xff, 0xfe, 0x00, 0x00, 0x01, 0xff, 0x02,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01, 0x86, 0x00, 0xa3, 0x2d, 0x40, 0x40,
            0x11, 0x94, 0x00, 0x01, 0xd4, 0xc0, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x01, 0xfa, 0x16, 0x3e, 0x00, 0x00, 0x01, 0x05, 0x01,
            0x00, 0x00, 0x00, 0x00, 0x05, 0xdc, 0x03, 0x04, 0x40, 0xc0,
            0x00, 0x27, 0x8d, 0x00, 0x00, 0x09, 0x3a, 0x80, 0x00, 0x00,
            0x00, 0x00, 0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ],
        Frame::new(
            MacAddr::from([0xfa, 0x16, 0x3e, 0x00, 0x00, 0x01]),
            MacAddr::from([0x33, 0x33, 0x00, 0x00, 0x00, 0x01]),
            ip6!("fe80::f816:3eff:fe00:1"),
            ip6!("ff02::1"),
            Packet::RouterAdvertisement(RouterAdvertisement {
                cur_hop_limit: 64,
                flags: RaFlags::OTHER,
                router_lifetime: 4500,
                reachable_time: 120000,
                retrans_timer: 0,
                source_ll_addr: Some(MacAddr::from([
                    0xfa, 0x16, 0x3e, 0x00, 0x00, 0x01,
                ])),
                mtu: Some(1500),
                prefixes: vec![PrefixInfo::new(
                    64,
                    PrefixFlags::ON_LINK | PrefixFlags::AUTONOMOUS,
                    2592000,
                    604800,
                    ip6!("2001:db8::"),
                )],
            }),
        ),
    )
});

//
// Tests.
//

#[test]
fn test_encode_rs_unspecified() {
    let (ref bytes, ref frame) = *RS_UNSPECIFIED;
    test_encode_frame(bytes, frame);
}

#[test]
fn test_decode_rs_unspecified() {
    let (ref bytes, ref frame) = *RS_UNSPECIFIED;
    test_decode_frame(bytes, frame);
}

#[test]
fn test_encode_rs_slla() {
    let (ref bytes, ref frame) = *RS_SLLA;
    test_encode_frame(bytes, frame);
}

#[test]
fn test_decode_rs_slla() {
    let (ref bytes, ref frame) = *RS_SLLA;
    test_decode_frame(bytes, frame);
}

#[test]
fn test_encode_ns() {
    let (ref bytes, ref frame) = *NS1;
    test_encode_frame(bytes, frame);
}

#[test]
fn test_decode_ns() {
    let (ref bytes, ref frame) = *NS1;
    test_decode_frame(bytes, frame);
}

#[test]
fn test_encode_na() {
    let (ref bytes, ref frame) = *NA1;
    test_encode_frame(bytes, frame);
}

#[test]
fn test_decode_na() {
    let (ref bytes, ref frame) = *NA1;
    test_decode_frame(bytes, frame);
}

#[test]
fn test_encode_ra() {
    let (ref bytes, ref frame) = *RA1;
    test_encode_frame(bytes, frame);
}

#[test]
fn test_decode_ra() {
    let (ref bytes, ref frame) = *RA1;
    test_decode_frame(bytes, frame);
}

#[test]
fn test_decode_ethernet_padding() {
    let (ref bytes, ref frame) = *RS_SLLA;
    let mut bytes = bytes.clone();
    bytes.extend_from_slice(&[0; 6]);
    test_decode_frame(&bytes, frame);
}

#[test]
fn test_checksum() {
    for fixture in [&*RS_UNSPECIFIED, &*RS_SLLA, &*NS1, &*NA1, &*RA1] {
        let (ref bytes, ref frame) = *fixture;
        let icmp = &bytes[ICMPV6_OFFSET..];
        let stored = u16::from_be_bytes([icmp[2], icmp[3]]);
        assert_eq!(
            packet::compute_checksum(&frame.src_ip, &frame.dst_ip, icmp),
            stored
        );
        assert!(packet::validate_checksum(
            &frame.src_ip,
            &frame.dst_ip,
            icmp,
            stored
        ));
        assert!(!packet::validate_checksum(
            &frame.src_ip,
            &frame.dst_ip,
            icmp,
            stored.wrapping_add(1)
        ));
    }
}

#[test]
fn test_decode_invalid_checksum() {
    let (ref bytes, _) = *RS_SLLA;
    let mut bytes = bytes.clone();
    bytes[ICMPV6_OFFSET + 3] = 0xfc;
    assert_eq!(
        Frame::decode(&bytes),
        Err(DecodeError::InvalidChecksum(0xb1fc))
    );
}

#[test]
fn test_decode_corrupted_body() {
    let (ref bytes, _) = *RS_SLLA;
    let mut bytes = bytes.clone();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    assert_eq!(
        Frame::decode(&bytes),
        Err(DecodeError::InvalidChecksum(0xb1fb))
    );
}

#[test]
fn test_decode_invalid_hop_limit() {
    let (ref bytes, _) = *NS1;
    let mut bytes = bytes.clone();
    bytes[21] = 64;
    assert_eq!(Frame::decode(&bytes), Err(DecodeError::InvalidHopLimit(64)));
}

#[test]
fn test_decode_invalid_ethertype() {
    let (ref bytes, _) = *NS1;
    let mut bytes = bytes.clone();
    bytes[12] = 0x08;
    bytes[13] = 0x00;
    assert_eq!(
        Frame::decode(&bytes),
        Err(DecodeError::InvalidEthertype(0x0800))
    );
}

#[test]
fn test_decode_truncated() {
    let (ref bytes, _) = *NS1;
    assert_eq!(
        Frame::decode(&bytes[..60]),
        Err(DecodeError::InvalidLength(32))
    );
    assert_eq!(
        Frame::decode(&bytes[..30]),
        Err(DecodeError::InsufficientData)
    );
}

#[test]
fn test_decode_zero_length_option() {
    let mut icmp = vec![135, 0, 0, 0, 0, 0, 0, 0];
    icmp.extend_from_slice(&ip6!("2001:db8::1").octets());
    icmp.extend_from_slice(&[1, 0, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    assert_eq!(
        Packet::decode(Bytes::from(icmp)),
        Err(DecodeError::InvalidOptionLength(1))
    );
}

#[test]
fn test_decode_multicast_target() {
    let mut icmp = vec![135, 0, 0, 0, 0, 0, 0, 0];
    icmp.extend_from_slice(&ip6!("ff02::1").octets());
    assert_eq!(
        Packet::decode(Bytes::from(icmp)),
        Err(DecodeError::InvalidTarget(ip6!("ff02::1")))
    );
}

#[test]
fn test_decode_unknown_option() {
    let mut icmp = vec![135, 0, 0, 0, 0, 0, 0, 0];
    icmp.extend_from_slice(&ip6!("2001:db8::1").octets());
    icmp.extend_from_slice(&[14, 1, 0, 0, 0, 0, 0, 0]);
    icmp.extend_from_slice(&[1, 1, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    let packet = Packet::decode(Bytes::from(icmp)).unwrap();
    let ns = packet.into_neighbor_solicitation().unwrap();
    assert_eq!(
        ns.source_ll_addr,
        Some(MacAddr::from([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]))
    );
}

#[test]
fn test_classify() {
    let (ref rs, _) = *RS_UNSPECIFIED;
    let (ref ns, _) = *NS1;
    let (ref na, _) = *NA1;
    let (ref ra, _) = *RA1;
    assert_eq!(
        packet::classify(rs),
        Some(IcmpV6Kind::RouterSolicitation)
    );
    assert_eq!(
        packet::classify(ns),
        Some(IcmpV6Kind::NeighborSolicitation)
    );
    assert_eq!(packet::classify(na), None);
    assert_eq!(packet::classify(ra), None);
    assert_eq!(packet::classify(&ns[..ICMPV6_OFFSET]), None);

    let mut ipv4 = ns.clone();
    ipv4[12] = 0x08;
    ipv4[13] = 0x00;
    assert_eq!(packet::classify(&ipv4), None);

    let mut udp = ns.clone();
    udp[20] = 17;
    assert_eq!(packet::classify(&udp), None);
}

#[test]
fn test_decode_expecting() {
    let (ref rs, _) = *RS_SLLA;
    let (ref ns, ref frame) = *NS1;
    assert_eq!(packet::decode_ns(ns).as_ref(), Ok(frame));
    assert_eq!(
        packet::decode_ns(rs),
        Err(DecodeError::UnexpectedMessageType(
            MessageType::RouterSolicitation
        ))
    );
    assert!(packet::decode_rs(rs).is_ok());
}
