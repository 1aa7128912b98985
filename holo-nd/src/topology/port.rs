//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv6Addr};

use holo_utils::mac_addr::MacAddr;
use serde::Serialize;

use crate::southbound::PortLocation;
use crate::topology::{NetworkId, PortId, RouterId, SubnetId};

#[derive(Clone, Debug, Serialize)]
pub struct VirtualPort {
    pub id: PortId,
    pub network_id: NetworkId,
    pub mac: MacAddr,
    pub is_router_interface: bool,
    pub device_owner: String,
    pub router_id: Option<RouterId>,
    // Bound addresses, indexed by subnet.
    pub fixed_ips: BTreeMap<SubnetId, IpAddr>,
    pub location: Option<PortLocation>,
    pub service_bound: bool,
}

// ===== impl VirtualPort =====

impl VirtualPort {
    pub(crate) fn new_router_interface(
        id: PortId,
        network_id: NetworkId,
        router_id: RouterId,
        mac: MacAddr,
        device_owner: String,
    ) -> VirtualPort {
        VirtualPort {
            id,
            network_id,
            mac,
            is_router_interface: true,
            device_owner,
            router_id: Some(router_id),
            fixed_ips: Default::default(),
            location: None,
            service_bound: false,
        }
    }

    pub(crate) fn new_host(
        id: PortId,
        network_id: NetworkId,
        mac: MacAddr,
        device_owner: String,
    ) -> VirtualPort {
        VirtualPort {
            id,
            network_id,
            mac,
            is_router_interface: false,
            device_owner,
            router_id: None,
            fixed_ips: Default::default(),
            location: None,
            service_bound: false,
        }
    }

    // EUI-64 link-local address derived from the port MAC.
    pub fn link_local(&self) -> Ipv6Addr {
        self.mac.to_link_local()
    }

    pub fn ipv6_addrs(&self) -> impl Iterator<Item = Ipv6Addr> + '_ {
        self.fixed_ips.values().filter_map(|addr| match addr {
            IpAddr::V6(addr) => Some(*addr),
            IpAddr::V4(_) => None,
        })
    }

    pub fn has_ipv6(&self) -> bool {
        self.ipv6_addrs().next().is_some()
    }

    pub fn subnet_ids(&self) -> BTreeSet<SubnetId> {
        self.fixed_ips.keys().copied().collect()
    }

    // Addresses the controller answers neighbor solicitations for on behalf
    // of this port: every bound IPv6 address plus the link-local one.
    pub fn nd_targets(&self) -> BTreeSet<Ipv6Addr> {
        let mut targets: BTreeSet<_> = self.ipv6_addrs().collect();
        targets.insert(self.link_local());
        targets
    }

    pub fn owns_address(&self, addr: &Ipv6Addr) -> bool {
        *addr == self.link_local() || self.ipv6_addrs().any(|a| a == *addr)
    }
}
