//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use holo_utils::ip::{self, Ipv6AddrExt};
use holo_utils::mac_addr::MacAddr;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::consts::PREFIX_LENGTH;
use crate::packet::{
    Frame, NaFlags, NeighborAdvertisement, NeighborSolicitation, Packet,
    PrefixFlags, PrefixInfo, RaFlags, RouterAdvertisement,
};
use crate::topology::port::VirtualPort;
use crate::topology::subnet::{Ipv6Mode, VirtualSubnet};

// Router advertisement delivery variants.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum RaKind {
    // Unicast reply to a router solicitation.
    Solicited,
    // Periodic advertisement flooded in the network.
    Unsolicited,
    // Sent once when the router interface goes away, with a zero router
    // lifetime.
    Cease,
}

// Router interface state an advertisement is built from.
#[derive(Clone, Copy, Debug)]
pub struct RouterContext<'a> {
    pub port: &'a VirtualPort,
    pub subnets: &'a [VirtualSubnet],
    // Zero when unknown.
    pub mtu: u32,
}

// ===== global functions =====

// Computes the M/O flags out of the RA modes of the IPv6 subnets.
pub fn ra_flags(subnets: &[VirtualSubnet]) -> RaFlags {
    let mut flags = RaFlags::empty();
    for subnet in subnets.iter().filter(|subnet| subnet.is_ipv6()) {
        match subnet.ra_mode {
            Some(Ipv6Mode::DhcpStateless) => flags.insert(RaFlags::OTHER),
            Some(Ipv6Mode::DhcpStateful) => flags.insert(RaFlags::MANAGED),
            _ => (),
        }
    }
    flags
}

// Builds one prefix information option per IPv6 subnet with an RA mode.
pub fn prefix_options(
    config: &Config,
    subnets: &[VirtualSubnet],
) -> Vec<PrefixInfo> {
    subnets
        .iter()
        .filter_map(|subnet| {
            let ra_mode = subnet.ra_mode?;
            let prefix = ip::ipv6_network(&subnet.cidr)?;
            let mut flags = PrefixFlags::ON_LINK;
            if matches!(ra_mode, Ipv6Mode::Slaac | Ipv6Mode::DhcpStateless) {
                flags.insert(PrefixFlags::AUTONOMOUS);
            }
            Some(PrefixInfo {
                prefix_len: PREFIX_LENGTH,
                flags,
                valid_lifetime: config.prefix_valid_lifetime,
                preferred_lifetime: config.prefix_preferred_lifetime,
                prefix: prefix.network(),
            })
        })
        .collect()
}

// Builds a router advertisement.
//
// Solicited advertisements go to the requester. Unsolicited and cease ones
// go to all nodes.
pub fn router_advertisement(
    config: &Config,
    kind: RaKind,
    router: RouterContext<'_>,
    requester: Option<(MacAddr, Ipv6Addr)>,
) -> Frame {
    let router_lifetime = match kind {
        RaKind::Cease => 0,
        RaKind::Solicited | RaKind::Unsolicited => config.router_lifetime,
    };
    let ra = RouterAdvertisement {
        cur_hop_limit: config.cur_hop_limit,
        flags: ra_flags(router.subnets),
        router_lifetime,
        reachable_time: config.reachable_time,
        retrans_timer: config.retrans_timer,
        source_ll_addr: Some(router.port.mac),
        mtu: (router.mtu != 0).then_some(router.mtu),
        prefixes: prefix_options(config, router.subnets),
    };

    let (dst_mac, dst_ip) = match (kind, requester) {
        (RaKind::Solicited, Some((mac, addr))) if !addr.is_unspecified() => {
            (mac, addr)
        }
        (RaKind::Solicited, Some((mac, _))) => (mac, Ipv6Addr::ALL_NODES),
        _ => (MacAddr::ALL_NODES, Ipv6Addr::ALL_NODES),
    };

    Frame::new(
        router.port.mac,
        dst_mac,
        router.port.link_local(),
        dst_ip,
        Packet::RouterAdvertisement(ra),
    )
}

// Builds the reply to a neighbor solicitation for one of the router's
// addresses.
//
// Solicitations from the unspecified address (duplicate address detection)
// are answered to all nodes, without the Solicited flag.
pub fn solicited_neighbor_advertisement(
    router: &VirtualPort,
    request: &Frame,
    ns: &NeighborSolicitation,
) -> Frame {
    let (flags, dst_mac, dst_ip) = if request.src_ip.is_unspecified() {
        (
            NaFlags::ROUTER | NaFlags::OVERRIDE,
            MacAddr::ALL_NODES,
            Ipv6Addr::ALL_NODES,
        )
    } else {
        (
            NaFlags::ROUTER | NaFlags::SOLICITED | NaFlags::OVERRIDE,
            ns.source_ll_addr.unwrap_or(request.src_mac),
            request.src_ip,
        )
    };
    let na = NeighborAdvertisement::new(flags, ns.target, Some(router.mac));

    Frame::new(
        router.mac,
        dst_mac,
        router.link_local(),
        dst_ip,
        Packet::NeighborAdvertisement(na),
    )
}

// Builds an unsolicited neighbor advertisement announcing one of the
// router's addresses to all nodes.
pub fn unsolicited_neighbor_advertisement(
    router: &VirtualPort,
    target: Ipv6Addr,
) -> Frame {
    let na = NeighborAdvertisement::new(
        NaFlags::ROUTER | NaFlags::OVERRIDE,
        target,
        Some(router.mac),
    );

    Frame::new(
        router.mac,
        MacAddr::ALL_NODES,
        router.link_local(),
        Ipv6Addr::ALL_NODES,
        Packet::NeighborAdvertisement(na),
    )
}

// Builds a neighbor solicitation for the given target, sent to its
// solicited-node multicast address.
pub fn neighbor_solicitation(router: &VirtualPort, target: Ipv6Addr) -> Frame {
    let dst_ip = target.solicited_node();
    let ns = NeighborSolicitation::new(target, Some(router.mac));

    Frame::new(
        router.mac,
        MacAddr::from_ipv6_multicast(&dst_ip),
        router.link_local(),
        dst_ip,
        Packet::NeighborSolicitation(ns),
    )
}
