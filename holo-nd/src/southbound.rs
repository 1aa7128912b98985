//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use bytes::Bytes;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::flows::FlowDescriptor;
use crate::topology::{ElanTag, NetworkId, NodeId, PortId};

// Logical port tag carried in the metadata of punted frames.
pub type LportTag = u32;

// Data-plane attachment point of a port.
#[derive(Clone, Copy, Debug, Eq, Hash, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct PortLocation {
    pub node_id: NodeId,
    pub ofport: u32,
}

// Metadata of a punted frame, identifying where it entered the data plane.
#[derive(Clone, Debug, Eq, Hash, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct IngressHandle {
    pub node_id: NodeId,
    pub lport_tag: LportTag,
}

// Where an outgoing frame is sent.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Egress {
    // Back through the handle the request came in on.
    Ingress(IngressHandle),
    // Flooded in the broadcast domain of a network.
    Flood {
        network_id: NetworkId,
        elan_tag: ElanTag,
    },
}

// Installs and removes punt flows on forwarding nodes. Calls are
// fire-and-forget from the engine's point of view.
pub trait FlowProgrammer: Send + Sync {
    fn request(&self, node_id: NodeId, flow: &FlowDescriptor)
    -> std::io::Result<()>;

    fn retract(&self, node_id: NodeId, flow: &FlowDescriptor)
    -> std::io::Result<()>;

    fn bind_service(&self, port_id: PortId) -> std::io::Result<()>;

    fn unbind_service(&self, port_id: PortId) -> std::io::Result<()>;
}

// Sends raw Ethernet frames.
pub trait PacketTransport: Send + Sync {
    fn send(&self, egress: Egress, frame: Bytes) -> std::io::Result<()>;
}

// Point-in-time view of cluster leadership.
pub trait LeadershipOracle: Send + Sync {
    fn is_leader(&self) -> bool;
}

// Resolves broadcast-domain tags of networks.
pub trait NetworkMetadata: Send + Sync {
    fn elan_tag_for(&self, network_id: NetworkId) -> Option<ElanTag>;
}

// Maps data-plane identifiers to ports.
pub trait InterfaceResolver: Send + Sync {
    fn port_by_lport_tag(&self, lport_tag: LportTag) -> Option<PortId>;

    fn location_of(&self, port_id: PortId) -> Option<PortLocation>;
}

// External collaborators of the ND engine.
#[derive(Clone, new)]
pub struct Southbound {
    pub flows: Arc<dyn FlowProgrammer>,
    pub transport: Arc<dyn PacketTransport>,
    pub leadership: Arc<dyn LeadershipOracle>,
    pub metadata: Arc<dyn NetworkMetadata>,
    pub resolver: Arc<dyn InterfaceResolver>,
}
