//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv6Addr;

use serde::Serialize;

use crate::flows::FlowIntent;
use crate::southbound::PortLocation;
use crate::topology::{ElanTag, NetworkId, NodeId, PortId};

#[derive(Clone, Debug, Serialize)]
pub struct VirtualNetwork {
    pub id: NetworkId,
    pub elan_tag: Option<ElanTag>,
    pub mtu: u32,
    // Ports attached to each forwarding node, indexed by egress port number.
    pub nodes: BTreeMap<NodeId, NodeInterfaces>,
    // Router interfaces that want router solicitations punted.
    pub rs_punt: BTreeSet<PortId>,
    // Addresses that want neighbor solicitations punted, along with the
    // router interfaces owning them.
    pub nd_targets: BTreeMap<Ipv6Addr, BTreeSet<PortId>>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NodeInterfaces {
    pub ports: BTreeMap<u32, PortId>,
}

// Outcome of attaching a port to a forwarding node.
#[derive(Debug, Default)]
pub(crate) struct Attachment {
    // The node had no ports of this network before.
    pub node_added: Option<NodeId>,
    // The previous node of the port has no ports of this network left.
    pub node_emptied: Option<NodeId>,
}

// ===== impl VirtualNetwork =====

impl VirtualNetwork {
    pub(crate) fn new(id: NetworkId) -> VirtualNetwork {
        VirtualNetwork {
            id,
            elan_tag: None,
            mtu: 0,
            nodes: Default::default(),
            rs_punt: Default::default(),
            nd_targets: Default::default(),
        }
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    // Flow intents that should be present on every node of the network.
    pub fn wanted_flows(&self) -> Vec<FlowIntent> {
        let rs = (!self.rs_punt.is_empty()).then_some(FlowIntent::RsPunt);
        rs.into_iter()
            .chain(self.nd_targets.keys().map(|addr| FlowIntent::NdPunt(*addr)))
            .collect()
    }

    // Records that a port wants the given intent. Returns true when the
    // intent just became wanted for the network.
    pub(crate) fn want(&mut self, port_id: PortId, intent: FlowIntent) -> bool {
        match intent {
            FlowIntent::RsPunt => {
                let first = self.rs_punt.is_empty();
                self.rs_punt.insert(port_id) && first
            }
            FlowIntent::NdPunt(addr) => {
                let owners = self.nd_targets.entry(addr).or_default();
                let first = owners.is_empty();
                owners.insert(port_id) && first
            }
        }
    }

    // Withdraws a port's interest in the given intent. Returns true when no
    // port wants the intent anymore.
    pub(crate) fn unwant(
        &mut self,
        port_id: PortId,
        intent: FlowIntent,
    ) -> bool {
        match intent {
            FlowIntent::RsPunt => {
                self.rs_punt.remove(&port_id) && self.rs_punt.is_empty()
            }
            FlowIntent::NdPunt(addr) => {
                let Some(owners) = self.nd_targets.get_mut(&addr) else {
                    return false;
                };
                if !owners.remove(&port_id) || !owners.is_empty() {
                    return false;
                }
                self.nd_targets.remove(&addr);
                true
            }
        }
    }

    // Withdraws every intent of the given port, returning the ones no longer
    // wanted by anyone.
    pub(crate) fn unwant_port(&mut self, port_id: PortId) -> Vec<FlowIntent> {
        let mut intents = vec![FlowIntent::RsPunt];
        intents.extend(
            self.nd_targets.keys().map(|addr| FlowIntent::NdPunt(*addr)),
        );
        intents
            .into_iter()
            .filter(|intent| self.unwant(port_id, *intent))
            .collect()
    }

    // Attaches a port to its (possibly new) location.
    pub(crate) fn attach(
        &mut self,
        port_id: PortId,
        location: PortLocation,
        previous: Option<PortLocation>,
    ) -> Attachment {
        let mut attachment = Attachment::default();

        if let Some(previous) = previous
            && previous != location
        {
            if previous.node_id == location.node_id {
                if let Some(node) = self.nodes.get_mut(&previous.node_id) {
                    node.ports.remove(&previous.ofport);
                }
            } else if self.detach(port_id, previous) {
                attachment.node_emptied = Some(previous.node_id);
            }
        }

        let node = self.nodes.entry(location.node_id).or_insert_with(|| {
            attachment.node_added = Some(location.node_id);
            Default::default()
        });
        node.ports.insert(location.ofport, port_id);

        attachment
    }

    // Detaches a port from the given location. Returns true if the node has
    // no ports left.
    pub(crate) fn detach(
        &mut self,
        port_id: PortId,
        location: PortLocation,
    ) -> bool {
        let Some(node) = self.nodes.get_mut(&location.node_id) else {
            return false;
        };
        if node.ports.get(&location.ofport) == Some(&port_id) {
            node.ports.remove(&location.ofport);
        }
        if node.ports.is_empty() {
            self.nodes.remove(&location.node_id);
            return true;
        }
        false
    }
}
