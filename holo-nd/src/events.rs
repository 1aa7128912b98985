//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use holo_utils::ip;
use holo_utils::mac_addr::MacAddr;
use serde::{Deserialize, Serialize};

use crate::consts::{DEVICE_OWNER_DVR_INTF, DEVICE_OWNER_ROUTER_INTF};
use crate::instance::Instance;
use crate::topology::{
    NetworkId, NodeId, PortId, RouterId, SubnetAttrs, SubnetId, TenantId,
};

// Topology changes delivered by the event source.
//
// Delivery is at-least-once and unordered, so every handler is idempotent.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum TopologyEvent {
    RouterAdd {
        router_id: RouterId,
        name: String,
        tenant_id: TenantId,
    },
    RouterDel {
        router_id: RouterId,
    },
    SubnetAdd {
        subnet_id: SubnetId,
        attrs: SubnetAttrs,
    },
    SubnetDel {
        subnet_id: SubnetId,
    },
    NetworkAdd {
        network_id: NetworkId,
        mtu: u32,
    },
    NetworkUpdate {
        network_id: NetworkId,
        mtu: u32,
    },
    NetworkDel {
        network_id: NetworkId,
    },
    PortAdd {
        port_id: PortId,
        network_id: NetworkId,
        router_id: Option<RouterId>,
        mac: MacAddr,
        fixed_ips: Vec<(SubnetId, String)>,
        device_owner: String,
    },
    PortUpdate {
        port_id: PortId,
        router_id: Option<RouterId>,
        fixed_ips: Vec<(SubnetId, String)>,
    },
    PortLocation {
        port_id: PortId,
        node_id: NodeId,
        ofport: u32,
    },
    PortDel {
        port_id: PortId,
    },
}

// ===== global functions =====

pub(crate) fn process_topology_event(
    instance: &Instance,
    event: TopologyEvent,
) {
    match event {
        TopologyEvent::RouterAdd {
            router_id,
            name,
            tenant_id,
        } => {
            instance.add_router(router_id, &name, tenant_id);
        }
        TopologyEvent::RouterDel { router_id } => {
            instance.remove_router(router_id);
        }
        TopologyEvent::SubnetAdd { subnet_id, attrs } => {
            instance.add_subnet(subnet_id, attrs);
        }
        TopologyEvent::SubnetDel { subnet_id } => {
            instance.remove_subnet(subnet_id);
        }
        TopologyEvent::NetworkAdd { network_id, mtu } => {
            instance.add_network(network_id);
            instance.update_network(network_id, mtu);
        }
        TopologyEvent::NetworkUpdate { network_id, mtu } => {
            instance.update_network(network_id, mtu);
        }
        TopologyEvent::NetworkDel { network_id } => {
            instance.remove_network(network_id);
        }
        TopologyEvent::PortAdd {
            port_id,
            network_id,
            router_id,
            mac,
            fixed_ips,
            device_owner,
        } => match router_id {
            Some(router_id)
                if is_router_interface(&device_owner) && fixed_ips.is_empty() =>
            {
                instance.add_unnumbered_router_interface(
                    port_id,
                    router_id,
                    network_id,
                    mac,
                    &device_owner,
                );
            }
            Some(router_id) if is_router_interface(&device_owner) => {
                for (subnet_id, addr) in &fixed_ips {
                    instance.add_router_interface(
                        port_id,
                        router_id,
                        *subnet_id,
                        network_id,
                        addr,
                        mac,
                        &device_owner,
                    );
                }
            }
            _ => {
                instance.add_host_interface(
                    port_id,
                    network_id,
                    mac,
                    &fixed_ips,
                    &device_owner,
                );
            }
        },
        TopologyEvent::PortUpdate {
            port_id,
            router_id,
            fixed_ips,
        } => {
            let Some(port) = instance.topology().port_by_id(&port_id) else {
                return;
            };
            match router_id {
                Some(router_id) if port.is_router_interface => {
                    instance.update_router_interface(
                        port_id, router_id, &fixed_ips,
                    );
                }
                _ => {
                    let includes_v6 = fixed_ips.iter().any(|(_, addr)| {
                        ip::normalize(addr).is_some_and(|addr| addr.is_ipv6())
                    });
                    instance.update_host_interface(port_id, includes_v6);
                }
            }
        }
        TopologyEvent::PortLocation {
            port_id,
            node_id,
            ofport,
        } => {
            instance.update_location(port_id, node_id, ofport);
        }
        TopologyEvent::PortDel { port_id } => {
            instance.remove_port(port_id);
        }
    }
}

fn is_router_interface(device_owner: &str) -> bool {
    device_owner == DEVICE_OWNER_ROUTER_INTF
        || device_owner == DEVICE_OWNER_DVR_INTF
}
