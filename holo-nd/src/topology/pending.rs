//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::flows::FlowIntent;
use crate::topology::{NetworkId, PortId, RouterId, SubnetId};

// Ports and flow intents referencing entities that weren't created yet.
//
// Entries leave a queue exactly once: either when the referenced entity is
// created (take) or when the referencing port is deleted (cancel).
#[derive(Debug, Default)]
pub struct PendingQueues {
    routers: HashMap<RouterId, BTreeSet<PortId>>,
    subnets: HashMap<SubnetId, BTreeSet<PortId>>,
    networks: HashMap<NetworkId, BTreeSet<PendingNetworkEntry>>,
}

// Work deferred until a network is known.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub enum PendingNetworkEntry {
    // Port whose location must be recorded in the network.
    Port(PortId),
    // Flow intent of a router interface.
    Flow(PortId, FlowIntent),
}

// ===== impl PendingQueues =====

impl PendingQueues {
    pub(crate) fn queue_router(
        &mut self,
        router_id: RouterId,
        port_id: PortId,
    ) -> bool {
        self.routers.entry(router_id).or_default().insert(port_id)
    }

    pub(crate) fn queue_subnet(
        &mut self,
        subnet_id: SubnetId,
        port_id: PortId,
    ) -> bool {
        self.subnets.entry(subnet_id).or_default().insert(port_id)
    }

    pub(crate) fn queue_network(
        &mut self,
        network_id: NetworkId,
        entry: PendingNetworkEntry,
    ) -> bool {
        self.networks.entry(network_id).or_default().insert(entry)
    }

    pub(crate) fn take_router(
        &mut self,
        router_id: &RouterId,
    ) -> BTreeSet<PortId> {
        self.routers.remove(router_id).unwrap_or_default()
    }

    pub(crate) fn take_subnet(
        &mut self,
        subnet_id: &SubnetId,
    ) -> BTreeSet<PortId> {
        self.subnets.remove(subnet_id).unwrap_or_default()
    }

    pub(crate) fn take_network(
        &mut self,
        network_id: &NetworkId,
    ) -> BTreeSet<PendingNetworkEntry> {
        self.networks.remove(network_id).unwrap_or_default()
    }

    // Removes a port from the pending-subnet queue of the given subnet.
    pub(crate) fn cancel_subnet(
        &mut self,
        subnet_id: &SubnetId,
        port_id: &PortId,
    ) {
        if let Some(ports) = self.subnets.get_mut(subnet_id) {
            ports.remove(port_id);
            if ports.is_empty() {
                self.subnets.remove(subnet_id);
            }
        }
    }

    // Removes a port from the pending-router queue of the given router.
    pub(crate) fn cancel_router(
        &mut self,
        router_id: &RouterId,
        port_id: &PortId,
    ) {
        if let Some(ports) = self.routers.get_mut(router_id) {
            ports.remove(port_id);
            if ports.is_empty() {
                self.routers.remove(router_id);
            }
        }
    }

    pub(crate) fn cancel_network_entry(
        &mut self,
        network_id: &NetworkId,
        entry: &PendingNetworkEntry,
    ) {
        if let Some(entries) = self.networks.get_mut(network_id) {
            entries.remove(entry);
            if entries.is_empty() {
                self.networks.remove(network_id);
            }
        }
    }

    // Cancels every entry referencing the given port. Returns the number of
    // entries removed.
    pub(crate) fn cancel_port(&mut self, port_id: &PortId) -> usize {
        let mut count = 0;
        let queues = self.routers.values_mut().chain(self.subnets.values_mut());
        for ports in queues {
            if ports.remove(port_id) {
                count += 1;
            }
        }
        for entries in self.networks.values_mut() {
            let before = entries.len();
            entries.retain(|entry| match entry {
                PendingNetworkEntry::Port(id)
                | PendingNetworkEntry::Flow(id, _) => id != port_id,
            });
            count += before - entries.len();
        }
        self.routers.retain(|_, ports| !ports.is_empty());
        self.subnets.retain(|_, ports| !ports.is_empty());
        self.networks.retain(|_, entries| !entries.is_empty());
        count
    }

    pub fn is_router_pending(
        &self,
        router_id: &RouterId,
        port_id: &PortId,
    ) -> bool {
        self.routers
            .get(router_id)
            .is_some_and(|ports| ports.contains(port_id))
    }

    pub fn is_subnet_pending(
        &self,
        subnet_id: &SubnetId,
        port_id: &PortId,
    ) -> bool {
        self.subnets
            .get(subnet_id)
            .is_some_and(|ports| ports.contains(port_id))
    }

    pub fn network_entries(
        &self,
        network_id: &NetworkId,
    ) -> impl Iterator<Item = &PendingNetworkEntry> + '_ {
        self.networks.get(network_id).into_iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
            && self.subnets.is_empty()
            && self.networks.is_empty()
    }
}

// ===== unit tests =====
