//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use holo_nd::config::Config;
use holo_nd::consts::DEVICE_OWNER_ROUTER_INTF;
use holo_nd::flows::{FlowDescriptor, FlowTracker};
use holo_nd::instance::Instance;
use holo_nd::packet::Frame;
use holo_nd::southbound::{
    Egress, FlowProgrammer, InterfaceResolver, LeadershipOracle, LportTag,
    NetworkMetadata, PacketTransport, PortLocation, Southbound,
};
use holo_nd::topology::subnet::Ipv6Mode;
use holo_nd::topology::{
    ElanTag, NetworkId, NodeId, PortId, RouterId, SubnetAttrs, SubnetId,
    TenantId, TopologyCache,
};
use holo_utils::ip::IpVersion;
use holo_utils::mac_addr::MacAddr;
use ipnetwork::IpNetwork;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use uuid::Uuid;

pub const TENANT1: TenantId = Uuid::from_u128(0x01);
pub const ROUTER1: RouterId = Uuid::from_u128(0x100);
pub const SUBNET1: SubnetId = Uuid::from_u128(0x200);
pub const SUBNET2: SubnetId = Uuid::from_u128(0x201);
pub const NETWORK1: NetworkId = Uuid::from_u128(0x300);
pub const ROUTER_PORT1: PortId = Uuid::from_u128(0x400);
pub const HOST_PORT1: PortId = Uuid::from_u128(0x401);
pub const ELAN_TAG1: ElanTag = 5000;
pub const LPORT_TAG1: LportTag = 100;
pub const NODE1: NodeId = 1;
pub const NODE2: NodeId = 2;

// Calls received by the flow programmer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FlowCall {
    Request(NodeId, FlowDescriptor),
    Retract(NodeId, FlowDescriptor),
    Bind(PortId),
    Unbind(PortId),
}

// Recording implementation of every southbound collaborator.
pub struct Stubs {
    leader: AtomicBool,
    flow_calls: Mutex<Vec<FlowCall>>,
    sent: Mutex<Vec<(Egress, Bytes)>>,
    elan_tags: Mutex<HashMap<NetworkId, ElanTag>>,
    lport_tags: Mutex<HashMap<LportTag, PortId>>,
    locations: Mutex<HashMap<PortId, PortLocation>>,
}

// ===== impl Stubs =====

impl Stubs {
    pub fn new() -> Arc<Stubs> {
        Arc::new(Stubs {
            leader: AtomicBool::new(true),
            flow_calls: Default::default(),
            sent: Default::default(),
            elan_tags: Default::default(),
            lport_tags: Default::default(),
            locations: Default::default(),
        })
    }

    pub fn southbound(self: &Arc<Self>) -> Southbound {
        Southbound::new(
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        )
    }

    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }

    pub fn set_elan_tag(&self, network_id: NetworkId, elan_tag: ElanTag) {
        self.elan_tags.lock().insert(network_id, elan_tag);
    }

    pub fn set_lport_tag(&self, lport_tag: LportTag, port_id: PortId) {
        self.lport_tags.lock().insert(lport_tag, port_id);
    }

    pub fn set_location(&self, port_id: PortId, node_id: NodeId, ofport: u32) {
        self.locations
            .lock()
            .insert(port_id, PortLocation::new(node_id, ofport));
    }

    pub fn take_flow_calls(&self) -> Vec<FlowCall> {
        std::mem::take(&mut *self.flow_calls.lock())
    }

    // Returns the frames sent so far, decoded.
    pub fn take_sent(&self) -> Vec<(Egress, Frame)> {
        std::mem::take(&mut *self.sent.lock())
            .into_iter()
            .map(|(egress, data)| (egress, Frame::decode(&data).unwrap()))
            .collect()
    }
}

impl FlowProgrammer for Stubs {
    fn request(
        &self,
        node_id: NodeId,
        flow: &FlowDescriptor,
    ) -> std::io::Result<()> {
        self.flow_calls
            .lock()
            .push(FlowCall::Request(node_id, *flow));
        Ok(())
    }

    fn retract(
        &self,
        node_id: NodeId,
        flow: &FlowDescriptor,
    ) -> std::io::Result<()> {
        self.flow_calls
            .lock()
            .push(FlowCall::Retract(node_id, *flow));
        Ok(())
    }

    fn bind_service(&self, port_id: PortId) -> std::io::Result<()> {
        self.flow_calls.lock().push(FlowCall::Bind(port_id));
        Ok(())
    }

    fn unbind_service(&self, port_id: PortId) -> std::io::Result<()> {
        self.flow_calls.lock().push(FlowCall::Unbind(port_id));
        Ok(())
    }
}

impl PacketTransport for Stubs {
    fn send(&self, egress: Egress, frame: Bytes) -> std::io::Result<()> {
        self.sent.lock().push((egress, frame));
        Ok(())
    }
}

impl LeadershipOracle for Stubs {
    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }
}

impl NetworkMetadata for Stubs {
    fn elan_tag_for(&self, network_id: NetworkId) -> Option<ElanTag> {
        self.elan_tags.lock().get(&network_id).copied()
    }
}

impl InterfaceResolver for Stubs {
    fn port_by_lport_tag(&self, lport_tag: LportTag) -> Option<PortId> {
        self.lport_tags.lock().get(&lport_tag).copied()
    }

    fn location_of(&self, port_id: PortId) -> Option<PortLocation> {
        self.locations.lock().get(&port_id).copied()
    }
}

// ===== helper functions =====

pub fn router_mac() -> MacAddr {
    MacAddr::from([0xfa, 0x16, 0x3e, 0x00, 0x00, 0x01])
}

pub fn host_mac() -> MacAddr {
    MacAddr::from([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])
}

pub fn subnet_attrs(cidr: &str, ra_mode: Option<Ipv6Mode>) -> SubnetAttrs {
    let cidr: IpNetwork = cidr.parse().unwrap();
    let ip_version = match cidr {
        IpNetwork::V4(_) => IpVersion::V4,
        IpNetwork::V6(_) => IpVersion::V6,
    };
    SubnetAttrs {
        name: "subnet".to_owned(),
        tenant_id: TENANT1,
        gateway_ip: "2001:db8::1".to_owned(),
        ip_version,
        addr_mode: ra_mode,
        ra_mode,
        cidr,
    }
}

// Initializes tracing subscriber.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt::Subscriber::builder()
            .with_target(false)
            .with_ansi(false)
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    });
}

pub fn topology(stubs: &Arc<Stubs>) -> TopologyCache {
    init_tracing();
    let flows = FlowTracker::new(stubs.clone(), stubs.clone());
    TopologyCache::new(flows, stubs.clone())
}

// Creates an instance running on the current runtime.
pub fn instance(stubs: &Arc<Stubs>) -> Instance {
    init_tracing();
    Instance::new(Config::default(), stubs.southbound(), &Handle::current())
}

// Builds a network with one IPv6 subnet (DHCPv6 stateless), a router
// interface owning 2001:db8::1 and a host port, both on NODE1.
//
// Frames and flow calls caused by the setup are discarded.
pub fn setup_network(instance: &Instance, stubs: &Arc<Stubs>) {
    stubs.set_elan_tag(NETWORK1, ELAN_TAG1);
    stubs.set_lport_tag(LPORT_TAG1, HOST_PORT1);
    stubs.set_location(ROUTER_PORT1, NODE1, 1);
    stubs.set_location(HOST_PORT1, NODE1, 2);

    instance.add_network(NETWORK1);
    instance.update_network(NETWORK1, 1500);
    instance.add_subnet(
        SUBNET1,
        subnet_attrs("2001:db8::/64", Some(Ipv6Mode::DhcpStateless)),
    );
    instance.add_router(ROUTER1, "router1", TENANT1);
    instance.add_router_interface(
        ROUTER_PORT1,
        ROUTER1,
        SUBNET1,
        NETWORK1,
        "2001:db8::1",
        router_mac(),
        DEVICE_OWNER_ROUTER_INTF,
    );
    instance.add_host_interface(
        HOST_PORT1,
        NETWORK1,
        host_mac(),
        &[(SUBNET1, "2001:db8::10".to_owned())],
        "compute:nova",
    );

    stubs.take_sent();
    stubs.take_flow_calls();
}
