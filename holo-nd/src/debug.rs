//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, debug_span};
use uuid::Uuid;

use crate::flows::FlowDescriptor;
use crate::packet::Packet;
use crate::southbound::{Egress, IngressHandle, PortLocation};
use crate::topology::{NetworkId, NodeId, PortId, RouterId, SubnetId};

// ND debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Topology
    RouterCreate(&'a RouterId),
    RouterDelete(&'a RouterId),
    SubnetCreate(&'a SubnetId),
    SubnetDelete(&'a SubnetId),
    NetworkCreate(&'a NetworkId),
    NetworkDelete(&'a NetworkId),
    PortCreate(&'a PortId),
    PortUpdate(&'a PortId),
    PortDelete(&'a PortId),
    PortQueued(&'a PortId, PendingKind, &'a Uuid),
    PendingFlush(PendingKind, &'a Uuid, usize),
    LocationUpdate(&'a PortId, &'a PortLocation),
    // Network
    PacketRx(&'a IngressHandle, &'a Packet),
    PacketTx(&'a Egress, &'a Packet),
    // Flows
    FlowRequest(NodeId, &'a FlowDescriptor),
    FlowRetract(NodeId, &'a FlowDescriptor),
    ServiceBind(&'a PortId),
    ServiceUnbind(&'a PortId),
    // Timers
    TimerStart(&'a PortId),
    TimerCancel(&'a PortId),
    TimerFire(&'a PortId),
}

// Kind of entity a pending queue waits for.
#[derive(Clone, Copy, Debug)]
pub enum PendingKind {
    Router,
    Subnet,
    Network,
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::RouterCreate(id) | Debug::RouterDelete(id) => {
                debug_span!("topology", router = %id).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::SubnetCreate(id) | Debug::SubnetDelete(id) => {
                debug_span!("topology", subnet = %id).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::NetworkCreate(id) | Debug::NetworkDelete(id) => {
                debug_span!("topology", network = %id).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::PortCreate(id)
            | Debug::PortUpdate(id)
            | Debug::PortDelete(id) => {
                debug_span!("topology", port = %id).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::PortQueued(port_id, kind, id) => {
                debug_span!("topology", port = %port_id).in_scope(|| {
                    debug!(?kind, %id, "{}", self);
                });
            }
            Debug::PendingFlush(kind, id, count) => {
                debug_span!("topology").in_scope(|| {
                    debug!(?kind, %id, %count, "{}", self);
                });
            }
            Debug::LocationUpdate(port_id, location) => {
                debug_span!("topology", port = %port_id).in_scope(|| {
                    let node = location.node_id;
                    let ofport = location.ofport;
                    debug!(%node, %ofport, "{}", self);
                });
            }
            Debug::PacketRx(ingress, packet) => {
                debug_span!("network").in_scope(|| {
                    let node = ingress.node_id;
                    let lport_tag = ingress.lport_tag;
                    debug_span!("input", %node, %lport_tag).in_scope(|| {
                        let data =
                            serde_json::to_string(&packet).unwrap_or_default();
                        debug!(%data, "{}", self);
                    });
                });
            }
            Debug::PacketTx(egress, packet) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("output", ?egress).in_scope(|| {
                        let data =
                            serde_json::to_string(&packet).unwrap_or_default();
                        debug!(%data, "{}", self);
                    });
                });
            }
            Debug::FlowRequest(node_id, flow)
            | Debug::FlowRetract(node_id, flow) => {
                debug_span!("flows", node = %node_id).in_scope(|| {
                    debug!(?flow, "{}", self);
                });
            }
            Debug::ServiceBind(port_id) | Debug::ServiceUnbind(port_id) => {
                debug_span!("flows", port = %port_id).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::TimerStart(port_id)
            | Debug::TimerCancel(port_id)
            | Debug::TimerFire(port_id) => {
                debug_span!("timer", port = %port_id).in_scope(|| {
                    debug!("{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::RouterCreate(..) => {
                write!(f, "router created")
            }
            Debug::RouterDelete(..) => {
                write!(f, "router deleted")
            }
            Debug::SubnetCreate(..) => {
                write!(f, "subnet created")
            }
            Debug::SubnetDelete(..) => {
                write!(f, "subnet deleted")
            }
            Debug::NetworkCreate(..) => {
                write!(f, "network created")
            }
            Debug::NetworkDelete(..) => {
                write!(f, "network deleted")
            }
            Debug::PortCreate(..) => {
                write!(f, "port created")
            }
            Debug::PortUpdate(..) => {
                write!(f, "port updated")
            }
            Debug::PortDelete(..) => {
                write!(f, "port deleted")
            }
            Debug::PortQueued(..) => {
                write!(f, "port queued waiting for dependency")
            }
            Debug::PendingFlush(..) => {
                write!(f, "flushing pending entries")
            }
            Debug::LocationUpdate(..) => {
                write!(f, "port location updated")
            }
            Debug::PacketRx(..) | Debug::PacketTx(..) => {
                write!(f, "packet")
            }
            Debug::FlowRequest(..) => {
                write!(f, "requesting punt flow")
            }
            Debug::FlowRetract(..) => {
                write!(f, "retracting punt flow")
            }
            Debug::ServiceBind(..) => {
                write!(f, "binding ND service")
            }
            Debug::ServiceUnbind(..) => {
                write!(f, "unbinding ND service")
            }
            Debug::TimerStart(..) => {
                write!(f, "advertisement timer started")
            }
            Debug::TimerCancel(..) => {
                write!(f, "advertisement timer cancelled")
            }
            Debug::TimerFire(..) => {
                write!(f, "advertisement timer fired")
            }
        }
    }
}
