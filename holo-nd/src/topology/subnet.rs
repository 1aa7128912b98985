//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use holo_utils::ip::IpVersion;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::topology::{PortId, RouterId, SubnetId, TenantId};

#[derive(Clone, Debug, Serialize)]
pub struct VirtualSubnet {
    pub id: SubnetId,
    pub tenant_id: TenantId,
    pub name: String,
    // Stored in fully expanded text form.
    pub gateway_ip: Option<String>,
    pub cidr: IpNetwork,
    pub ip_version: IpVersion,
    pub addr_mode: Option<Ipv6Mode>,
    pub ra_mode: Option<Ipv6Mode>,
    pub router_id: Option<RouterId>,
    pub ports: BTreeSet<PortId>,
}

// IPv6 address configuration modes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ipv6Mode {
    Slaac,
    DhcpStateless,
    DhcpStateful,
}

// ===== impl VirtualSubnet =====

impl VirtualSubnet {
    pub fn is_ipv6(&self) -> bool {
        self.ip_version == IpVersion::V6
    }
}

// ===== impl Ipv6Mode =====

impl std::fmt::Display for Ipv6Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ipv6Mode::Slaac => write!(f, "slaac"),
            Ipv6Mode::DhcpStateless => write!(f, "dhcpv6-stateless"),
            Ipv6Mode::DhcpStateful => write!(f, "dhcpv6-stateful"),
        }
    }
}
