//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod network;
pub mod pending;
pub mod port;
pub mod router;
pub mod subnet;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;

use holo_utils::ip::{self, IpVersion};
use holo_utils::mac_addr::MacAddr;
use ipnetwork::IpNetwork;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::debug::{Debug, PendingKind};
use crate::flows::{FlowIntent, FlowTracker};
use crate::southbound::{NetworkMetadata, PortLocation};
use crate::topology::network::VirtualNetwork;
use crate::topology::pending::{PendingNetworkEntry, PendingQueues};
use crate::topology::port::VirtualPort;
use crate::topology::router::VirtualRouter;
use crate::topology::subnet::{Ipv6Mode, VirtualSubnet};

// Type aliases.
pub type PortId = Uuid;
pub type SubnetId = Uuid;
pub type RouterId = Uuid;
pub type NetworkId = Uuid;
pub type TenantId = Uuid;
pub type NodeId = u64;
pub type ElanTag = u32;
type Shared<T> = Arc<Mutex<T>>;

// In-memory registry of virtual routers, subnets, networks and ports.
//
// Entities reference each other by id only. Each top-level map has its own
// lock and each entity is individually locked, so unrelated entities never
// contend. Linking (and the pending queues it consults) is serialized by the
// pending-queues lock.
//
// Lock order: pending queues, then top-level maps, then entities, then the
// flow tracker. A map guard is never held while locking an entity.
pub struct TopologyCache {
    ports: RwLock<HashMap<PortId, Shared<VirtualPort>>>,
    subnets: RwLock<HashMap<SubnetId, Shared<VirtualSubnet>>>,
    routers: RwLock<HashMap<RouterId, Shared<VirtualRouter>>>,
    networks: RwLock<HashMap<NetworkId, Shared<VirtualNetwork>>>,
    // Router interfaces of each network.
    router_ports: RwLock<HashMap<NetworkId, BTreeSet<PortId>>>,
    pending: Mutex<PendingQueues>,
    flows: FlowTracker,
    metadata: Arc<dyn NetworkMetadata>,
}

// Outcome of adding or updating a router interface.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct PortChange {
    // The port didn't exist before.
    pub created: bool,
    // ND targets gained and lost by the port.
    pub added: Vec<Ipv6Addr>,
    pub removed: Vec<Ipv6Addr>,
}

// Attributes of a subnet, as received from the topology event source.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SubnetAttrs {
    pub name: String,
    pub tenant_id: TenantId,
    pub gateway_ip: String,
    pub ip_version: IpVersion,
    pub addr_mode: Option<Ipv6Mode>,
    pub ra_mode: Option<Ipv6Mode>,
    pub cidr: IpNetwork,
}

// ===== impl TopologyCache =====

impl TopologyCache {
    pub fn new(
        flows: FlowTracker,
        metadata: Arc<dyn NetworkMetadata>,
    ) -> TopologyCache {
        TopologyCache {
            ports: Default::default(),
            subnets: Default::default(),
            routers: Default::default(),
            networks: Default::default(),
            router_ports: Default::default(),
            pending: Default::default(),
            flows,
            metadata,
        }
    }

    // ----- routers -----

    pub fn add_router(
        &self,
        router_id: RouterId,
        name: &str,
        tenant_id: TenantId,
    ) {
        let mut pending = self.pending.lock();

        if let Some(router) = self.router(&router_id) {
            let mut router = router.lock();
            router.name = name.to_owned();
            router.tenant_id = tenant_id;
        } else {
            let router = VirtualRouter {
                id: router_id,
                tenant_id,
                name: name.to_owned(),
                subnets: Default::default(),
                ports: Default::default(),
            };
            self.routers
                .write()
                .insert(router_id, Arc::new(Mutex::new(router)));
            Debug::RouterCreate(&router_id).log();
        }

        // Flush ports waiting for this router.
        let ports = pending.take_router(&router_id);
        if !ports.is_empty() {
            Debug::PendingFlush(PendingKind::Router, &router_id, ports.len())
                .log();
        }
        for port_id in ports {
            self.link_port(&mut pending, port_id);
        }
    }

    // Removes a router, detaching its subnets. Its interfaces wait in the
    // pending-router queue in case the router comes back.
    pub fn remove_router(&self, router_id: RouterId) -> bool {
        let mut pending = self.pending.lock();

        let Some(router) = self.routers.write().remove(&router_id) else {
            return false;
        };
        Debug::RouterDelete(&router_id).log();

        let (ports, subnets) = {
            let router = router.lock();
            (router.ports.clone(), router.subnets.clone())
        };
        for subnet_id in subnets {
            if let Some(subnet) = self.subnet(&subnet_id) {
                let mut subnet = subnet.lock();
                if subnet.router_id == Some(router_id) {
                    subnet.router_id = None;
                }
            }
        }
        for port_id in ports {
            if pending.queue_router(router_id, port_id) {
                Debug::PortQueued(&port_id, PendingKind::Router, &router_id)
                    .log();
            }
        }

        true
    }

    // ----- subnets -----

    pub fn add_subnet(&self, subnet_id: SubnetId, attrs: SubnetAttrs) {
        let mut pending = self.pending.lock();

        let gateway_ip = ip::expand(&attrs.gateway_ip);
        if let Some(subnet) = self.subnet(&subnet_id) {
            let mut subnet = subnet.lock();
            subnet.name = attrs.name;
            subnet.tenant_id = attrs.tenant_id;
            subnet.gateway_ip = gateway_ip;
            subnet.ip_version = attrs.ip_version;
            subnet.addr_mode = attrs.addr_mode;
            subnet.ra_mode = attrs.ra_mode;
            subnet.cidr = attrs.cidr;
        } else {
            let subnet = VirtualSubnet {
                id: subnet_id,
                tenant_id: attrs.tenant_id,
                name: attrs.name,
                gateway_ip,
                cidr: attrs.cidr,
                ip_version: attrs.ip_version,
                addr_mode: attrs.addr_mode,
                ra_mode: attrs.ra_mode,
                router_id: None,
                ports: Default::default(),
            };
            self.subnets
                .write()
                .insert(subnet_id, Arc::new(Mutex::new(subnet)));
            Debug::SubnetCreate(&subnet_id).log();
        }

        // Flush ports waiting for this subnet.
        let ports = pending.take_subnet(&subnet_id);
        if !ports.is_empty() {
            Debug::PendingFlush(PendingKind::Subnet, &subnet_id, ports.len())
                .log();
        }
        for port_id in ports {
            self.link_port(&mut pending, port_id);
        }
    }

    // Removes a subnet, detaching its member ports and clearing the router
    // back-reference. Router interfaces still bound to the subnet wait in the
    // pending-subnet queue in case the subnet comes back.
    pub fn remove_subnet(&self, subnet_id: SubnetId) -> bool {
        let mut pending = self.pending.lock();

        let Some(subnet) = self.subnets.write().remove(&subnet_id) else {
            return false;
        };
        Debug::SubnetDelete(&subnet_id).log();

        let (ports, router_id) = {
            let subnet = subnet.lock();
            (subnet.ports.clone(), subnet.router_id)
        };
        if let Some(router) = router_id.and_then(|id| self.router(&id)) {
            router.lock().subnets.remove(&subnet_id);
        }
        for port_id in ports {
            let Some(port) = self.port(&port_id) else {
                continue;
            };
            let bound = {
                let port = port.lock();
                port.is_router_interface
                    && port.fixed_ips.contains_key(&subnet_id)
            };
            if bound && pending.queue_subnet(subnet_id, port_id) {
                Debug::PortQueued(&port_id, PendingKind::Subnet, &subnet_id)
                    .log();
            }
        }

        true
    }

    // ----- networks -----

    pub fn add_network(&self, network_id: NetworkId) {
        let mut pending = self.pending.lock();

        let network = match self.network(&network_id) {
            Some(network) => network,
            None => {
                let network =
                    Arc::new(Mutex::new(VirtualNetwork::new(network_id)));
                self.networks.write().insert(network_id, network.clone());
                Debug::NetworkCreate(&network_id).log();
                network
            }
        };

        // Flush ports and flow intents waiting for this network.
        let entries = pending.take_network(&network_id);
        if !entries.is_empty() {
            Debug::PendingFlush(
                PendingKind::Network,
                &network_id,
                entries.len(),
            )
            .log();
            self.flush_network(&network, entries);
        }

        // The network may have been known already with flows that couldn't be
        // programmed (e.g. the broadcast domain wasn't resolvable yet).
        self.sync_network_flows(&network_id);
    }

    // Updates the MTU advertised in router advertisements.
    pub fn update_network(&self, network_id: NetworkId, mtu: u32) -> bool {
        let Some(network) = self.network(&network_id) else {
            return false;
        };
        network.lock().mtu = mtu;
        self.sync_network_flows(&network_id);
        true
    }

    // Removes a network, retracting every punt flow associated with it.
    // Ports and flow intents referencing the network wait in the pending
    // queue in case the network comes back.
    pub fn remove_network(&self, network_id: NetworkId) -> bool {
        let mut pending = self.pending.lock();

        let Some(network) = self.networks.write().remove(&network_id) else {
            return false;
        };
        Debug::NetworkDelete(&network_id).log();

        let network = network.lock();
        self.flows.clear_network(network_id);

        let ports = network.nodes.values().flat_map(|node| node.ports.values());
        for port_id in ports {
            let entry = PendingNetworkEntry::Port(*port_id);
            pending.queue_network(network_id, entry);
        }
        for port_id in &network.rs_punt {
            let entry = PendingNetworkEntry::Flow(*port_id, FlowIntent::RsPunt);
            pending.queue_network(network_id, entry);
        }
        for (addr, owners) in &network.nd_targets {
            for port_id in owners {
                let intent = FlowIntent::NdPunt(*addr);
                let entry = PendingNetworkEntry::Flow(*port_id, intent);
                pending.queue_network(network_id, entry);
            }
        }

        true
    }

    // ----- ports -----

    // Adds (or extends) a router interface with one subnet binding.
    //
    // On first creation the port wants router solicitations and neighbor
    // solicitations for its link-local address punted to the controller.
    pub fn add_router_interface(
        &self,
        port_id: PortId,
        router_id: RouterId,
        subnet_id: SubnetId,
        network_id: NetworkId,
        ip: &str,
        mac: MacAddr,
        device_owner: &str,
    ) -> PortChange {
        let mut pending = self.pending.lock();

        let Some((port, created)) = self.router_interface_entry(
            port_id,
            router_id,
            network_id,
            mac,
            device_owner,
        ) else {
            return PortChange::default();
        };

        let (network_id, before, after) = {
            let mut port = port.lock();
            let before = if created {
                BTreeSet::new()
            } else {
                port.nd_targets()
            };
            match ip::normalize(ip) {
                Some(addr) => {
                    port.fixed_ips.insert(subnet_id, addr);
                }
                None => {
                    warn!(%port_id, %ip, "ignoring invalid address");
                }
            }
            (port.network_id, before, port.nd_targets())
        };
        self.router_ports
            .write()
            .entry(network_id)
            .or_default()
            .insert(port_id);
        if created {
            Debug::PortCreate(&port_id).log();
        } else {
            Debug::PortUpdate(&port_id).log();
        }

        self.link_port(&mut pending, port_id);

        let change = PortChange {
            created,
            added: after.difference(&before).copied().collect(),
            removed: before.difference(&after).copied().collect(),
        };
        let mut wanted = vec![];
        if created {
            wanted.push(FlowIntent::RsPunt);
        }
        wanted.extend(
            change.added.iter().map(|addr| FlowIntent::NdPunt(*addr)),
        );
        let unwanted = change
            .removed
            .iter()
            .map(|addr| FlowIntent::NdPunt(*addr))
            .collect::<Vec<_>>();
        self.want_flows(&mut pending, network_id, port_id, &wanted);
        self.unwant_flows(&mut pending, network_id, port_id, &unwanted);
        self.sync_network_flows(&network_id);

        change
    }

    // Adds a router interface that has no addresses yet. Its subnet bindings
    // arrive later through `update_router_interface`.
    pub fn add_unnumbered_router_interface(
        &self,
        port_id: PortId,
        router_id: RouterId,
        network_id: NetworkId,
        mac: MacAddr,
        device_owner: &str,
    ) -> PortChange {
        let mut pending = self.pending.lock();

        let Some((port, created)) = self.router_interface_entry(
            port_id,
            router_id,
            network_id,
            mac,
            device_owner,
        ) else {
            return PortChange::default();
        };
        if !created {
            return PortChange::default();
        }

        let (network_id, targets) = {
            let port = port.lock();
            (port.network_id, port.nd_targets())
        };
        self.router_ports
            .write()
            .entry(network_id)
            .or_default()
            .insert(port_id);
        Debug::PortCreate(&port_id).log();

        self.link_port(&mut pending, port_id);

        let change = PortChange {
            created,
            added: targets.into_iter().collect(),
            removed: vec![],
        };
        let mut wanted = vec![FlowIntent::RsPunt];
        wanted.extend(
            change.added.iter().map(|addr| FlowIntent::NdPunt(*addr)),
        );
        self.want_flows(&mut pending, network_id, port_id, &wanted);
        self.sync_network_flows(&network_id);

        change
    }

    // Recomputes the subnet and address bindings of a router interface.
    //
    // Returns None if the port isn't a known router interface.
    pub fn update_router_interface(
        &self,
        port_id: PortId,
        router_id: RouterId,
        fixed_ips: &[(SubnetId, String)],
    ) -> Option<PortChange> {
        let mut pending = self.pending.lock();

        let port = self.port(&port_id)?;
        let (network_id, old_router, old_subnets, before, after) = {
            let mut port = port.lock();
            if !port.is_router_interface {
                return None;
            }
            let old_router = port.router_id.replace(router_id);
            let old_subnets = port.subnet_ids();
            let before = port.nd_targets();
            port.fixed_ips = normalize_fixed_ips(fixed_ips);
            (
                port.network_id,
                old_router,
                old_subnets,
                before,
                port.nd_targets(),
            )
        };
        Debug::PortUpdate(&port_id).log();

        // Detach from subnets and router no longer referenced.
        let new_subnets = self.port_subnet_ids(&port_id);
        for subnet_id in old_subnets.difference(&new_subnets) {
            pending.cancel_subnet(subnet_id, &port_id);
            if let Some(subnet) = self.subnet(subnet_id) {
                subnet.lock().ports.remove(&port_id);
            }
        }
        if let Some(old_router) = old_router {
            if old_router != router_id {
                pending.cancel_router(&old_router, &port_id);
                if let Some(router) = self.router(&old_router) {
                    router.lock().ports.remove(&port_id);
                }
            }
            self.refresh_router_subnets(old_router);
        }
        self.link_port(&mut pending, port_id);

        let change = PortChange {
            created: false,
            added: after.difference(&before).copied().collect(),
            removed: before.difference(&after).copied().collect(),
        };
        let wanted = change
            .added
            .iter()
            .map(|addr| FlowIntent::NdPunt(*addr))
            .collect::<Vec<_>>();
        let unwanted = change
            .removed
            .iter()
            .map(|addr| FlowIntent::NdPunt(*addr))
            .collect::<Vec<_>>();
        self.want_flows(&mut pending, network_id, port_id, &wanted);
        self.unwant_flows(&mut pending, network_id, port_id, &unwanted);
        self.sync_network_flows(&network_id);

        Some(change)
    }

    // Adds a host port. Host ports carry service-binding state only.
    //
    // Returns true if the port was created.
    pub fn add_host_interface(
        &self,
        port_id: PortId,
        network_id: NetworkId,
        mac: MacAddr,
        fixed_ips: &[(SubnetId, String)],
        device_owner: &str,
    ) -> bool {
        let created = {
            let mut ports = self.ports.write();
            if ports.contains_key(&port_id) {
                false
            } else {
                let mut port = VirtualPort::new_host(
                    port_id,
                    network_id,
                    mac,
                    device_owner.to_owned(),
                );
                port.fixed_ips = normalize_fixed_ips(fixed_ips);
                ports.insert(port_id, Arc::new(Mutex::new(port)));
                true
            }
        };
        if created {
            Debug::PortCreate(&port_id).log();
        }

        let port = self.port_by_id(&port_id);
        match port {
            Some(port) if !port.is_router_interface => {
                self.update_host_interface(port_id, port.has_ipv6());
                self.sync_network_flows(&port.network_id);
            }
            _ => (),
        }
        created
    }

    // Binds or unbinds a host port to the ND service depending on whether it
    // has IPv6 addresses.
    pub fn update_host_interface(
        &self,
        port_id: PortId,
        includes_v6: bool,
    ) -> bool {
        let Some(port) = self.port(&port_id) else {
            return false;
        };
        let mut port = port.lock();
        if port.is_router_interface || port.service_bound == includes_v6 {
            return false;
        }
        port.service_bound = includes_v6;
        if includes_v6 {
            self.flows.bind_service(port_id);
        } else {
            self.flows.unbind_service(port_id);
        }
        true
    }

    // Re-attempts every punt flow and service binding that couldn't be
    // programmed, and retracts the ones left behind. Meant to be called when
    // this instance becomes the cluster leader.
    pub fn sync_flows(&self) -> usize {
        let _pending = self.pending.lock();

        let mut network_ids = self.flows.network_ids();
        network_ids.extend(self.networks.read().keys().copied());
        let mut count = 0;
        for network_id in network_ids {
            let elan_tag = self
                .network(&network_id)
                .and_then(|network| self.network_elan_tag(&network));
            count += self.flows.sync_network(network_id, elan_tag);
        }
        count + self.flows.sync_bindings()
    }

    // Records where a port lives in the data plane.
    pub fn update_location(
        &self,
        port_id: PortId,
        node_id: NodeId,
        ofport: u32,
    ) -> bool {
        let mut pending = self.pending.lock();

        let Some(port) = self.port(&port_id) else {
            return false;
        };
        let location = PortLocation::new(node_id, ofport);
        let (network_id, previous) = {
            let mut port = port.lock();
            let previous = port.location.replace(location);
            (port.network_id, previous)
        };
        Debug::LocationUpdate(&port_id, &location).log();

        let Some(network) = self.network(&network_id) else {
            let entry = PendingNetworkEntry::Port(port_id);
            if pending.queue_network(network_id, entry) {
                Debug::PortQueued(&port_id, PendingKind::Network, &network_id)
                    .log();
            }
            return true;
        };

        let elan_tag = self.network_elan_tag(&network);
        {
            let mut network = network.lock();
            let attachment = network.attach(port_id, location, previous);
            if let Some(node_id) = attachment.node_emptied {
                self.flows.clear_node(node_id, network_id);
            }
            if let Some(node_id) = attachment.node_added {
                for intent in network.wanted_flows() {
                    self.flows.request(node_id, network_id, elan_tag, intent);
                }
            }
        }
        self.sync_network_flows(&network_id);

        true
    }

    // Removes a port, detaching it from its router, subnets and network and
    // retracting the punt flows it wanted.
    //
    // Returns the removed port.
    pub fn remove_port(&self, port_id: PortId) -> Option<VirtualPort> {
        let mut pending = self.pending.lock();

        let port = self.ports.write().remove(&port_id)?;
        let port = port.lock().clone();
        pending.cancel_port(&port_id);

        if port.is_router_interface {
            if let Some(ports) =
                self.router_ports.write().get_mut(&port.network_id)
            {
                ports.remove(&port_id);
            }
            for subnet_id in port.subnet_ids() {
                if let Some(subnet) = self.subnet(&subnet_id) {
                    subnet.lock().ports.remove(&port_id);
                }
            }
            if let Some(router_id) = port.router_id {
                if let Some(router) = self.router(&router_id) {
                    router.lock().ports.remove(&port_id);
                }
                self.refresh_router_subnets(router_id);
            }
        }

        if let Some(network) = self.network(&port.network_id) {
            let mut network = network.lock();
            if let Some(location) = port.location
                && network.detach(port_id, location)
            {
                self.flows.clear_node(location.node_id, port.network_id);
            }
            for intent in network.unwant_port(port_id) {
                for node_id in network.node_ids() {
                    self.flows.retract(node_id, port.network_id, intent);
                }
            }
        }

        if port.service_bound {
            self.flows.unbind_service(port_id);
        }
        self.sync_network_flows(&port.network_id);
        Debug::PortDelete(&port_id).log();

        Some(port)
    }

    // ----- lookups -----

    // Returns the router interface serving the given network, i.e. the
    // first one having an IPv6 address.
    pub fn router_interface_for_network(
        &self,
        network_id: &NetworkId,
    ) -> Option<PortId> {
        let candidates = self.router_ports.read().get(network_id)?.clone();
        candidates.into_iter().find(|port_id| {
            self.port(port_id).is_some_and(|port| {
                let port = port.lock();
                port.is_router_interface && port.has_ipv6()
            })
        })
    }

    // Returns the broadcast-domain tag of a network, resolving and caching
    // it on first use.
    pub fn elan_tag_for_network(
        &self,
        network_id: &NetworkId,
    ) -> Option<ElanTag> {
        let network = self.network(network_id)?;
        self.network_elan_tag(&network)
    }

    pub fn port_by_id(&self, port_id: &PortId) -> Option<VirtualPort> {
        self.port(port_id).map(|port| port.lock().clone())
    }

    pub fn subnet_by_id(&self, subnet_id: &SubnetId) -> Option<VirtualSubnet> {
        self.subnet(subnet_id).map(|subnet| subnet.lock().clone())
    }

    pub fn router_by_id(&self, router_id: &RouterId) -> Option<VirtualRouter> {
        self.router(router_id).map(|router| router.lock().clone())
    }

    pub fn network_by_id(
        &self,
        network_id: &NetworkId,
    ) -> Option<VirtualNetwork> {
        self.network(network_id).map(|network| network.lock().clone())
    }

    // Returns the known subnets the port is bound to.
    pub fn subnets_of_port(&self, port_id: &PortId) -> Vec<VirtualSubnet> {
        self.port_subnet_ids(port_id)
            .iter()
            .filter_map(|subnet_id| self.subnet_by_id(subnet_id))
            .collect()
    }

    pub fn port_ids(&self) -> Vec<PortId> {
        self.ports.read().keys().copied().collect()
    }

    pub fn flows(&self) -> &FlowTracker {
        &self.flows
    }

    pub fn with_pending<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&PendingQueues) -> R,
    {
        f(&self.pending.lock())
    }

    // ----- helpers -----

    fn port(&self, port_id: &PortId) -> Option<Shared<VirtualPort>> {
        self.ports.read().get(port_id).cloned()
    }

    fn subnet(&self, subnet_id: &SubnetId) -> Option<Shared<VirtualSubnet>> {
        self.subnets.read().get(subnet_id).cloned()
    }

    fn router(&self, router_id: &RouterId) -> Option<Shared<VirtualRouter>> {
        self.routers.read().get(router_id).cloned()
    }

    fn network(
        &self,
        network_id: &NetworkId,
    ) -> Option<Shared<VirtualNetwork>> {
        self.networks.read().get(network_id).cloned()
    }

    // Looks up a router interface, creating it if needed. Returns None if the
    // id belongs to a host port.
    fn router_interface_entry(
        &self,
        port_id: PortId,
        router_id: RouterId,
        network_id: NetworkId,
        mac: MacAddr,
        device_owner: &str,
    ) -> Option<(Shared<VirtualPort>, bool)> {
        let port = {
            let mut ports = self.ports.write();
            if let Some(port) = ports.get(&port_id) {
                port.clone()
            } else {
                let port = VirtualPort::new_router_interface(
                    port_id,
                    network_id,
                    router_id,
                    mac,
                    device_owner.to_owned(),
                );
                let port = Arc::new(Mutex::new(port));
                ports.insert(port_id, port.clone());
                return Some((port, true));
            }
        };
        if !port.lock().is_router_interface {
            warn!(%port_id, "ignoring router binding of a host port");
            return None;
        }
        Some((port, false))
    }

    fn port_subnet_ids(&self, port_id: &PortId) -> BTreeSet<SubnetId> {
        self.port(port_id)
            .map(|port| port.lock().subnet_ids())
            .unwrap_or_default()
    }

    fn network_elan_tag(
        &self,
        network: &Shared<VirtualNetwork>,
    ) -> Option<ElanTag> {
        let network_id = {
            let network = network.lock();
            if network.elan_tag.is_some() {
                return network.elan_tag;
            }
            network.id
        };
        let elan_tag = self.metadata.elan_tag_for(network_id)?;
        network.lock().elan_tag = Some(elan_tag);
        Some(elan_tag)
    }

    // Links a router interface to its subnets and router, queueing it for
    // the ones that don't exist yet. Linking is idempotent, so every
    // creation order converges to the same state.
    fn link_port(&self, pending: &mut PendingQueues, port_id: PortId) {
        let Some(port) = self.port(&port_id) else {
            return;
        };
        let (router_id, subnet_ids) = {
            let port = port.lock();
            if !port.is_router_interface {
                return;
            }
            (port.router_id, port.subnet_ids())
        };

        let mut linked = vec![];
        for subnet_id in subnet_ids {
            match self.subnet(&subnet_id) {
                Some(subnet) => {
                    subnet.lock().ports.insert(port_id);
                    linked.push((subnet_id, subnet));
                }
                None => {
                    if pending.queue_subnet(subnet_id, port_id) {
                        Debug::PortQueued(
                            &port_id,
                            PendingKind::Subnet,
                            &subnet_id,
                        )
                        .log();
                    }
                }
            }
        }

        let Some(router_id) = router_id else {
            return;
        };
        let Some(router) = self.router(&router_id) else {
            if pending.queue_router(router_id, port_id) {
                Debug::PortQueued(&port_id, PendingKind::Router, &router_id)
                    .log();
            }
            return;
        };
        {
            let mut router = router.lock();
            router.ports.insert(port_id);
            router.subnets.extend(linked.iter().map(|(id, _)| *id));
        }
        for (_, subnet) in linked {
            subnet.lock().router_id = Some(router_id);
        }
    }

    // Recomputes the subnets of a router from the subnets its interfaces are
    // bound to, clearing the back-reference of subnets no longer linked.
    fn refresh_router_subnets(&self, router_id: RouterId) {
        let Some(router) = self.router(&router_id) else {
            return;
        };
        let ports = router.lock().ports.clone();
        let subnets = ports
            .iter()
            .flat_map(|port_id| self.port_subnet_ids(port_id))
            .filter(|subnet_id| self.subnet(subnet_id).is_some())
            .collect::<BTreeSet<_>>();

        let unlinked = {
            let mut router = router.lock();
            let unlinked = router
                .subnets
                .difference(&subnets)
                .copied()
                .collect::<Vec<_>>();
            router.subnets = subnets;
            unlinked
        };
        for subnet_id in unlinked {
            if let Some(subnet) = self.subnet(&subnet_id) {
                let mut subnet = subnet.lock();
                if subnet.router_id == Some(router_id) {
                    subnet.router_id = None;
                }
            }
        }
    }

    // Attaches the ports and records the flow intents that were waiting
    // for a network.
    fn flush_network(
        &self,
        network: &Shared<VirtualNetwork>,
        entries: BTreeSet<PendingNetworkEntry>,
    ) {
        let elan_tag = self.network_elan_tag(network);
        let mut network = network.lock();
        let network_id = network.id;
        for entry in entries {
            match entry {
                PendingNetworkEntry::Port(port_id) => {
                    let location = self
                        .port(&port_id)
                        .and_then(|port| port.lock().location);
                    if let Some(location) = location {
                        network.attach(port_id, location, None);
                    }
                }
                PendingNetworkEntry::Flow(port_id, intent) => {
                    network.want(port_id, intent);
                }
            }
        }
        for node_id in network.node_ids() {
            for intent in network.wanted_flows() {
                self.flows.request(node_id, network_id, elan_tag, intent);
            }
        }
    }

    // Programs the flows and service bindings of a network left unprogrammed
    // by earlier events. No entity guard may be held.
    fn sync_network_flows(&self, network_id: &NetworkId) {
        let Some(network) = self.network(network_id) else {
            return;
        };
        let elan_tag = self.network_elan_tag(&network);
        self.flows.sync_network(*network_id, elan_tag);
        self.flows.sync_bindings();
    }

    // Records flow intents of a router interface, requesting the ones that
    // became wanted on every node of the network.
    fn want_flows(
        &self,
        pending: &mut PendingQueues,
        network_id: NetworkId,
        port_id: PortId,
        intents: &[FlowIntent],
    ) {
        let Some(network) = self.network(&network_id) else {
            for intent in intents {
                let entry = PendingNetworkEntry::Flow(port_id, *intent);
                pending.queue_network(network_id, entry);
            }
            return;
        };

        let elan_tag = self.network_elan_tag(&network);
        let mut network = network.lock();
        for intent in intents {
            if network.want(port_id, *intent) {
                for node_id in network.node_ids() {
                    self.flows.request(node_id, network_id, elan_tag, *intent);
                }
            }
        }
    }

    // Withdraws flow intents of a router interface, retracting the ones no
    // longer wanted from every node of the network.
    fn unwant_flows(
        &self,
        pending: &mut PendingQueues,
        network_id: NetworkId,
        port_id: PortId,
        intents: &[FlowIntent],
    ) {
        let Some(network) = self.network(&network_id) else {
            for intent in intents {
                let entry = PendingNetworkEntry::Flow(port_id, *intent);
                pending.cancel_network_entry(&network_id, &entry);
            }
            return;
        };

        let mut network = network.lock();
        for intent in intents {
            if network.unwant(port_id, *intent) {
                for node_id in network.node_ids() {
                    self.flows.retract(node_id, network_id, *intent);
                }
            }
        }
    }
}

// ===== global functions =====

fn normalize_fixed_ips(
    fixed_ips: &[(SubnetId, String)],
) -> BTreeMap<SubnetId, IpAddr> {
    fixed_ips
        .iter()
        .filter_map(|(subnet_id, addr)| {
            ip::normalize(addr).map(|addr| (*subnet_id, addr))
        })
        .collect()
}
