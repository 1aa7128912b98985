//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use holo_utils::mac_addr::MacAddr;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::advertisement::{self, RaKind, RouterContext};
use crate::config::Config;
use crate::debug::Debug;
use crate::error::{Error, IoError};
use crate::events::{self, TopologyEvent};
use crate::flows::FlowTracker;
use crate::packet::{self, DecodeError, Frame};
use crate::responder;
use crate::scheduler::Scheduler;
use crate::southbound::{Egress, IngressHandle, Southbound};
use crate::tasks::{self, PacketMsg, PacketWorkers};
use crate::topology::port::VirtualPort;
use crate::topology::{
    NetworkId, NodeId, PortChange, PortId, RouterId, SubnetAttrs, SubnetId,
    TenantId, TopologyCache,
};

// ND engine instance.
//
// Dropping the instance cancels every advertisement timer and stops the
// packet workers.
pub struct Instance {
    inner: Arc<InstanceInner>,
    workers: PacketWorkers,
    // Serializes the creation and removal of router interfaces together
    // with their advertisement timers.
    lifecycle: Mutex<()>,
}

// State shared between the instance, its packet workers and its timers.
pub struct InstanceInner {
    pub config: Config,
    pub topology: TopologyCache,
    pub scheduler: Scheduler,
    pub southbound: Southbound,
    pub statistics: Statistics,
}

#[derive(Debug)]
pub struct Statistics {
    discontinuity_time: Mutex<DateTime<Utc>>,
    pub frames_rcvd: AtomicU64,
    pub frames_ignored: AtomicU64,
    pub frames_processed: AtomicU64,
    pub checksum_errors: AtomicU64,
    pub decode_errors: AtomicU64,
    pub drops: AtomicU64,
    pub queue_full_drops: AtomicU64,
    pub ns_rcvd: AtomicU64,
    pub rs_rcvd: AtomicU64,
    pub na_sent: AtomicU64,
    pub ra_sent: AtomicU64,
    pub ns_sent: AtomicU64,
    pub send_errors: AtomicU64,
}

// Point-in-time copy of the statistics.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub discontinuity_time: DateTime<Utc>,
    pub frames_rcvd: u64,
    pub frames_ignored: u64,
    pub frames_processed: u64,
    pub checksum_errors: u64,
    pub decode_errors: u64,
    pub drops: u64,
    pub queue_full_drops: u64,
    pub ns_rcvd: u64,
    pub rs_rcvd: u64,
    pub na_sent: u64,
    pub ra_sent: u64,
    pub ns_sent: u64,
    pub send_errors: u64,
}

// ===== impl Instance =====

impl Instance {
    // Creates a new instance whose timers and packet workers run on the given
    // runtime.
    pub fn new(
        config: Config,
        southbound: Southbound,
        handle: &Handle,
    ) -> Instance {
        let flows = FlowTracker::new(
            southbound.flows.clone(),
            southbound.leadership.clone(),
        );
        let topology = TopologyCache::new(flows, southbound.metadata.clone());
        let scheduler = Scheduler::new(handle.clone(), config.ra_interval());
        let inner = Arc::new(InstanceInner {
            topology,
            scheduler,
            southbound,
            statistics: Statistics::default(),
            config,
        });
        let workers = tasks::packet_workers(
            handle,
            inner.config.worker_count,
            inner.config.packet_queue_size,
            inner.clone(),
        );

        Instance {
            inner,
            workers,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn topology(&self) -> &TopologyCache {
        &self.inner.topology
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.inner.statistics.snapshot()
    }

    pub fn clear_statistics(&self) {
        self.inner.statistics.clear();
    }

    // Changes the period of unsolicited advertisements. Running timers pick
    // up the new period the next time they re-arm.
    pub fn set_ra_interval(&self, interval: Duration) {
        self.inner.scheduler.set_period(interval);
    }

    // Hands a punted frame to the packet workers.
    //
    // Frames that aren't neighbor or router solicitations are ignored. When
    // the queue is full, the frame is dropped.
    pub fn receive(
        &self,
        ingress: IngressHandle,
        data: Bytes,
    ) -> Result<(), Error> {
        let stats = &self.inner.statistics;
        stats.frames_rcvd.fetch_add(1, Ordering::Relaxed);
        if packet::classify(&data).is_none() {
            stats.frames_ignored.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        self.workers
            .try_send(PacketMsg { ingress, data })
            .inspect_err(|_| {
                stats.queue_full_drops.fetch_add(1, Ordering::Relaxed);
            })
    }

    // Processes a punted frame synchronously.
    pub fn process_packet(
        &self,
        ingress: &IngressHandle,
        data: &[u8],
    ) -> Result<(), Error> {
        self.inner.process_packet(ingress, data)
    }

    pub fn process_topology_event(&self, event: TopologyEvent) {
        events::process_topology_event(self, event);
    }

    // ----- topology -----

    pub fn add_router(
        &self,
        router_id: RouterId,
        name: &str,
        tenant_id: TenantId,
    ) {
        self.inner.topology.add_router(router_id, name, tenant_id);
    }

    pub fn remove_router(&self, router_id: RouterId) -> bool {
        self.inner.topology.remove_router(router_id)
    }

    pub fn add_subnet(&self, subnet_id: SubnetId, attrs: SubnetAttrs) {
        self.inner.topology.add_subnet(subnet_id, attrs);
    }

    pub fn remove_subnet(&self, subnet_id: SubnetId) -> bool {
        self.inner.topology.remove_subnet(subnet_id)
    }

    pub fn add_network(&self, network_id: NetworkId) {
        self.inner.topology.add_network(network_id);
    }

    pub fn update_network(&self, network_id: NetworkId, mtu: u32) -> bool {
        self.inner.topology.update_network(network_id, mtu)
    }

    pub fn remove_network(&self, network_id: NetworkId) -> bool {
        self.inner.topology.remove_network(network_id)
    }

    // Adds a router interface binding. A newly created interface gets its
    // advertisement timer armed and its location resolved.
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
        let change = {
            let _guard = self.lifecycle.lock();
            let change = self.inner.topology.add_router_interface(
                port_id,
                router_id,
                subnet_id,
                network_id,
                ip,
                mac,
                device_owner,
            );
            if change.created {
                self.start_timer(port_id);
                self.resolve_location(port_id);
            }
            change
        };
        self.inner.announce_addresses(port_id, &change.added);
        change
    }

    // Adds a router interface that has no addresses yet, e.g. one whose
    // fixed IPs are assigned by a later port update.
    pub fn add_unnumbered_router_interface(
        &self,
        port_id: PortId,
        router_id: RouterId,
        network_id: NetworkId,
        mac: MacAddr,
        device_owner: &str,
    ) -> PortChange {
        let change = {
            let _guard = self.lifecycle.lock();
            let change = self.inner.topology.add_unnumbered_router_interface(
                port_id,
                router_id,
                network_id,
                mac,
                device_owner,
            );
            if change.created {
                self.start_timer(port_id);
                self.resolve_location(port_id);
            }
            change
        };
        self.inner.announce_addresses(port_id, &change.added);
        change
    }

    pub fn update_router_interface(
        &self,
        port_id: PortId,
        router_id: RouterId,
        fixed_ips: &[(SubnetId, String)],
    ) -> Option<PortChange> {
        let change = self.inner.topology.update_router_interface(
            port_id, router_id, fixed_ips,
        )?;
        self.inner.announce_addresses(port_id, &change.added);
        Some(change)
    }

    pub fn add_host_interface(
        &self,
        port_id: PortId,
        network_id: NetworkId,
        mac: MacAddr,
        fixed_ips: &[(SubnetId, String)],
        device_owner: &str,
    ) -> bool {
        let created = self.inner.topology.add_host_interface(
            port_id,
            network_id,
            mac,
            fixed_ips,
            device_owner,
        );
        if created {
            self.resolve_location(port_id);
        }
        created
    }

    pub fn update_host_interface(
        &self,
        port_id: PortId,
        includes_v6: bool,
    ) -> bool {
        self.inner.topology.update_host_interface(port_id, includes_v6)
    }

    pub fn update_location(
        &self,
        port_id: PortId,
        node_id: NodeId,
        ofport: u32,
    ) -> bool {
        self.inner.topology.update_location(port_id, node_id, ofport)
    }

    // Programs the punt flows and service bindings recorded while this
    // instance wasn't the cluster leader. Returns the number of calls made.
    pub fn sync_flows(&self) -> usize {
        self.inner.topology.sync_flows()
    }

    // Removes a port.
    //
    // The advertisement timer is cancelled first, waiting for an in-flight
    // fire to complete. The port is then removed from the topology and, if
    // it's a router interface, a single cease advertisement is flooded.
    pub fn remove_port(&self, port_id: PortId) -> Option<VirtualPort> {
        let port = {
            let _guard = self.lifecycle.lock();
            self.inner.scheduler.cancel(&port_id);
            self.inner.topology.remove_port(port_id)?
        };
        if port.is_router_interface
            && let Err(error) = self.inner.advertise(&port, RaKind::Cease)
        {
            error.log();
        }
        Some(port)
    }

    // Sends a neighbor solicitation for the given target out of a router
    // interface.
    pub fn send_neighbor_solicitation(
        &self,
        port_id: PortId,
        target: Ipv6Addr,
    ) -> Result<(), Error> {
        let inner = &self.inner;
        let port = inner
            .topology
            .port_by_id(&port_id)
            .ok_or(Error::PortNotFound(port_id))?;
        let egress = inner.flood_egress(port.network_id)?;
        let frame = advertisement::neighbor_solicitation(&port, target);
        if inner.send_frame(egress, &frame)? {
            inner.statistics.ns_sent.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn start_timer(&self, port_id: PortId) {
        let inner = Arc::downgrade(&self.inner);
        self.inner.scheduler.start(port_id, move || {
            if let Some(inner) = inner.upgrade() {
                inner.periodic_advertisement(port_id);
            }
        });
    }

    fn resolve_location(&self, port_id: PortId) {
        let inner = &self.inner;
        if let Some(location) = inner.southbound.resolver.location_of(port_id) {
            inner.topology.update_location(
                port_id,
                location.node_id,
                location.ofport,
            );
        }
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // Timer callbacks hold weak references to the shared state; make
        // sure none of them is running before it goes away.
        self.inner.scheduler.cancel_all();
    }
}

// ===== impl InstanceInner =====

impl InstanceInner {
    // Processes a punted frame, updating the statistics.
    pub(crate) fn process_packet(
        &self,
        ingress: &IngressHandle,
        data: &[u8],
    ) -> Result<(), Error> {
        let stats = &self.statistics;
        stats.frames_processed.fetch_add(1, Ordering::Relaxed);

        let result = responder::process_packet(self, ingress, data);
        match &result {
            Err(Error::PacketDecodeError(DecodeError::InvalidChecksum(_))) => {
                stats.checksum_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(Error::PacketDecodeError(_)) => {
                stats.decode_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) if error.is_policy_drop() => {
                stats.drops.fetch_add(1, Ordering::Relaxed);
            }
            _ => (),
        }
        result
    }

    // Callback of the advertisement timer.
    fn periodic_advertisement(&self, port_id: PortId) {
        Debug::TimerFire(&port_id).log();

        // Followers keep their timers running but stay silent.
        if !self.southbound.leadership.is_leader() {
            return;
        }
        // The port might have been removed while the timer was firing.
        let Some(port) = self.topology.port_by_id(&port_id) else {
            return;
        };
        if !port.is_router_interface || !port.has_ipv6() {
            return;
        }
        if let Err(error) = self.advertise(&port, RaKind::Unsolicited) {
            error.log();
        }
    }

    // Floods a router advertisement in the network of the given router
    // interface.
    pub(crate) fn advertise(
        &self,
        port: &VirtualPort,
        kind: RaKind,
    ) -> Result<(), Error> {
        let egress = self.flood_egress(port.network_id)?;
        let subnets = port
            .subnet_ids()
            .iter()
            .filter_map(|subnet_id| self.topology.subnet_by_id(subnet_id))
            .collect::<Vec<_>>();
        let mtu = self
            .topology
            .network_by_id(&port.network_id)
            .map(|network| network.mtu)
            .unwrap_or(0);
        let router = RouterContext {
            port,
            subnets: &subnets,
            mtu,
        };
        let frame = advertisement::router_advertisement(
            &self.config,
            kind,
            router,
            None,
        );
        if self.send_frame(egress, &frame)? {
            self.statistics.ra_sent.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    // Floods one unsolicited neighbor advertisement per address.
    fn announce_addresses(&self, port_id: PortId, addrs: &[Ipv6Addr]) {
        if addrs.is_empty() || !self.southbound.leadership.is_leader() {
            return;
        }
        let Some(port) = self.topology.port_by_id(&port_id) else {
            return;
        };
        let egress = match self.flood_egress(port.network_id) {
            Ok(egress) => egress,
            Err(error) => {
                error.log();
                return;
            }
        };
        for addr in addrs {
            let frame =
                advertisement::unsolicited_neighbor_advertisement(&port, *addr);
            match self.send_frame(egress.clone(), &frame) {
                Ok(true) => {
                    self.statistics.na_sent.fetch_add(1, Ordering::Relaxed);
                }
                Ok(false) => (),
                Err(error) => error.log(),
            }
        }
    }

    pub(crate) fn flood_egress(
        &self,
        network_id: NetworkId,
    ) -> Result<Egress, Error> {
        let elan_tag = self
            .topology
            .elan_tag_for_network(&network_id)
            .ok_or(Error::ElanTagNotFound(network_id))?;
        Ok(Egress::Flood {
            network_id,
            elan_tag,
        })
    }

    // Encodes and sends a frame. Returns false if this instance isn't the
    // cluster leader, in which case nothing is sent.
    pub(crate) fn send_frame(
        &self,
        egress: Egress,
        frame: &Frame,
    ) -> Result<bool, Error> {
        if !self.southbound.leadership.is_leader() {
            return Ok(false);
        }
        Debug::PacketTx(&egress, &frame.packet).log();
        self.southbound
            .transport
            .send(egress, frame.encode())
            .map_err(|error| {
                self.statistics.send_errors.fetch_add(1, Ordering::Relaxed);
                Error::from(IoError::PacketSendError(error))
            })?;
        Ok(true)
    }
}

// ===== impl Statistics =====

impl Statistics {
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatisticsSnapshot {
            discontinuity_time: *self.discontinuity_time.lock(),
            frames_rcvd: load(&self.frames_rcvd),
            frames_ignored: load(&self.frames_ignored),
            frames_processed: load(&self.frames_processed),
            checksum_errors: load(&self.checksum_errors),
            decode_errors: load(&self.decode_errors),
            drops: load(&self.drops),
            queue_full_drops: load(&self.queue_full_drops),
            ns_rcvd: load(&self.ns_rcvd),
            rs_rcvd: load(&self.rs_rcvd),
            na_sent: load(&self.na_sent),
            ra_sent: load(&self.ra_sent),
            ns_sent: load(&self.ns_sent),
            send_errors: load(&self.send_errors),
        }
    }

    // Resets every counter, updating the discontinuity time.
    pub fn clear(&self) {
        for counter in [
            &self.frames_rcvd,
            &self.frames_ignored,
            &self.frames_processed,
            &self.checksum_errors,
            &self.decode_errors,
            &self.drops,
            &self.queue_full_drops,
            &self.ns_rcvd,
            &self.rs_rcvd,
            &self.na_sent,
            &self.ra_sent,
            &self.ns_sent,
            &self.send_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.discontinuity_time.lock() = Utc::now();
    }
}

impl Default for Statistics {
    fn default() -> Statistics {
        Statistics {
            discontinuity_time: Mutex::new(Utc::now()),
            frames_rcvd: Default::default(),
            frames_ignored: Default::default(),
            frames_processed: Default::default(),
            checksum_errors: Default::default(),
            decode_errors: Default::default(),
            drops: Default::default(),
            queue_full_drops: Default::default(),
            ns_rcvd: Default::default(),
            rs_rcvd: Default::default(),
            na_sent: Default::default(),
            ra_sent: Default::default(),
            ns_sent: Default::default(),
            send_errors: Default::default(),
        }
    }
}
