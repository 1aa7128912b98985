//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv6Addr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::error::{Error, IoError};
use crate::southbound::{FlowProgrammer, LeadershipOracle};
use crate::topology::{ElanTag, NetworkId, NodeId, PortId};

// Punt flow that should exist on every forwarding node of a network.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum FlowIntent {
    RsPunt,
    NdPunt(Ipv6Addr),
}

// Flow handed to the flow-programming collaborator.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum FlowDescriptor {
    // Punt router solicitations received in the broadcast domain.
    RsPunt { elan_tag: ElanTag },
    // Punt neighbor solicitations for the given target.
    NdPunt { elan_tag: ElanTag, target: Ipv6Addr },
}

// Punt flows present on a forwarding node for a given network.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct NodeFlows {
    pub rs_punt: bool,
    pub nd_targets: BTreeSet<Ipv6Addr>,
}

// Idempotent bookkeeping of the punt flows wanted per (node, network).
//
// Wanted flows and flows actually handed to the flow programmer are tracked
// separately. A wanted flow is programmed only while this instance is the
// cluster leader and the network's broadcast domain is known; the ones that
// couldn't be programmed are retried by the next request or sync.
pub struct FlowTracker {
    state: Mutex<FlowState>,
    programmer: Arc<dyn FlowProgrammer>,
    leadership: Arc<dyn LeadershipOracle>,
}

type FlowKey = (NodeId, NetworkId);

#[derive(Debug, Default)]
struct FlowState {
    wanted: HashMap<FlowKey, NodeFlows>,
    // Descriptor used to program each flow, so that it can be retracted
    // after the network is gone.
    programmed: HashMap<FlowKey, BTreeMap<FlowIntent, FlowDescriptor>>,
    // Host ports that should be bound to the ND service, and the ones
    // actually bound.
    bindings_wanted: BTreeSet<PortId>,
    bindings: BTreeSet<PortId>,
}

// ===== impl FlowIntent =====

impl FlowIntent {
    pub fn descriptor(&self, elan_tag: ElanTag) -> FlowDescriptor {
        match self {
            FlowIntent::RsPunt => FlowDescriptor::RsPunt { elan_tag },
            FlowIntent::NdPunt(target) => FlowDescriptor::NdPunt {
                elan_tag,
                target: *target,
            },
        }
    }
}

// ===== impl NodeFlows =====

impl NodeFlows {
    fn insert(&mut self, intent: FlowIntent) -> bool {
        match intent {
            FlowIntent::RsPunt => !std::mem::replace(&mut self.rs_punt, true),
            FlowIntent::NdPunt(target) => self.nd_targets.insert(target),
        }
    }

    fn remove(&mut self, intent: FlowIntent) -> bool {
        match intent {
            FlowIntent::RsPunt => std::mem::replace(&mut self.rs_punt, false),
            FlowIntent::NdPunt(target) => self.nd_targets.remove(&target),
        }
    }

    fn contains(&self, intent: FlowIntent) -> bool {
        match intent {
            FlowIntent::RsPunt => self.rs_punt,
            FlowIntent::NdPunt(target) => self.nd_targets.contains(&target),
        }
    }

    fn intents(&self) -> Vec<FlowIntent> {
        let rs = self.rs_punt.then_some(FlowIntent::RsPunt);
        rs.into_iter()
            .chain(self.nd_targets.iter().map(|addr| FlowIntent::NdPunt(*addr)))
            .collect()
    }

    fn is_empty(&self) -> bool {
        !self.rs_punt && self.nd_targets.is_empty()
    }
}

// ===== impl FlowTracker =====

impl FlowTracker {
    pub fn new(
        programmer: Arc<dyn FlowProgrammer>,
        leadership: Arc<dyn LeadershipOracle>,
    ) -> FlowTracker {
        FlowTracker {
            state: Default::default(),
            programmer,
            leadership,
        }
    }

    // Requests a punt flow on a node. Returns false if the flow was already
    // requested.
    //
    // A flow requested earlier but not yet programmed is programmed now if
    // possible.
    pub fn request(
        &self,
        node_id: NodeId,
        network_id: NetworkId,
        elan_tag: Option<ElanTag>,
        intent: FlowIntent,
    ) -> bool {
        let mut state = self.state.lock();
        let key = (node_id, network_id);
        let added = state.wanted.entry(key).or_default().insert(intent);
        if !state.is_programmed(&key, &intent) {
            self.install(&mut state, key, elan_tag, intent);
        }
        added
    }

    // Retracts a punt flow from a node. Returns false if the flow wasn't
    // requested.
    pub fn retract(
        &self,
        node_id: NodeId,
        network_id: NetworkId,
        intent: FlowIntent,
    ) -> bool {
        let mut state = self.state.lock();
        let key = (node_id, network_id);
        let Some(flows) = state.wanted.get_mut(&key) else {
            return false;
        };
        if !flows.remove(intent) {
            return false;
        }
        if flows.is_empty() {
            state.wanted.remove(&key);
        }
        self.uninstall(&mut state, key, intent);
        true
    }

    // Retracts every punt flow of the network from the given node. Returns
    // the number of flows that were wanted.
    pub fn clear_node(&self, node_id: NodeId, network_id: NetworkId) -> usize {
        let mut state = self.state.lock();
        let key = (node_id, network_id);
        let wanted = state
            .wanted
            .remove(&key)
            .map(|flows| flows.intents().len())
            .unwrap_or(0);
        for intent in state.programmed_intents(&key) {
            self.uninstall(&mut state, key, intent);
        }
        wanted
    }

    // Retracts every punt flow of the network from all nodes.
    pub fn clear_network(&self, network_id: NetworkId) -> usize {
        let nodes = self
            .state
            .lock()
            .keys()
            .into_iter()
            .filter(|(_, id)| *id == network_id)
            .map(|(node_id, _)| node_id)
            .collect::<Vec<_>>();
        nodes
            .into_iter()
            .map(|node_id| self.clear_node(node_id, network_id))
            .sum()
    }

    // Brings the programmed flows of a network in line with the wanted ones.
    // Returns the number of flows requested or retracted.
    pub fn sync_network(
        &self,
        network_id: NetworkId,
        elan_tag: Option<ElanTag>,
    ) -> usize {
        if !self.leadership.is_leader() {
            return 0;
        }

        let mut state = self.state.lock();
        let keys = state
            .keys()
            .into_iter()
            .filter(|(_, id)| *id == network_id)
            .collect::<Vec<_>>();
        let mut count = 0;
        for key in keys {
            let wanted = state
                .wanted
                .get(&key)
                .map(|flows| flows.intents())
                .unwrap_or_default();
            let programmed = state.programmed_intents(&key);
            for intent in programmed.iter().filter(|i| !wanted.contains(*i)) {
                if self.uninstall(&mut state, key, *intent) {
                    count += 1;
                }
            }
            if elan_tag.is_none() {
                continue;
            }
            for intent in wanted.iter().filter(|i| !programmed.contains(*i)) {
                if self.install(&mut state, key, elan_tag, *intent) {
                    count += 1;
                }
            }
        }
        count
    }

    // Brings the programmed service bindings in line with the wanted ones.
    pub fn sync_bindings(&self) -> usize {
        if !self.leadership.is_leader() {
            return 0;
        }

        let mut state = self.state.lock();
        let bind = state
            .bindings_wanted
            .difference(&state.bindings)
            .copied()
            .collect::<Vec<_>>();
        let unbind = state
            .bindings
            .difference(&state.bindings_wanted)
            .copied()
            .collect::<Vec<_>>();
        let mut count = 0;
        for port_id in bind {
            if self.bind(&mut state, port_id) {
                count += 1;
            }
        }
        for port_id in unbind {
            if self.unbind(&mut state, port_id) {
                count += 1;
            }
        }
        count
    }

    // Networks having wanted or programmed flows.
    pub fn network_ids(&self) -> BTreeSet<NetworkId> {
        self.state
            .lock()
            .keys()
            .into_iter()
            .map(|(_, network_id)| network_id)
            .collect()
    }

    pub fn contains(
        &self,
        node_id: NodeId,
        network_id: NetworkId,
        intent: FlowIntent,
    ) -> bool {
        self.state
            .lock()
            .wanted
            .get(&(node_id, network_id))
            .is_some_and(|flows| flows.contains(intent))
    }

    pub fn is_programmed(
        &self,
        node_id: NodeId,
        network_id: NetworkId,
        intent: FlowIntent,
    ) -> bool {
        self.state
            .lock()
            .is_programmed(&(node_id, network_id), &intent)
    }

    // Flows wanted on a node.
    pub fn node_flows(
        &self,
        node_id: NodeId,
        network_id: NetworkId,
    ) -> NodeFlows {
        self.state
            .lock()
            .wanted
            .get(&(node_id, network_id))
            .cloned()
            .unwrap_or_default()
    }

    // Flows actually programmed on a node.
    pub fn programmed_flows(
        &self,
        node_id: NodeId,
        network_id: NetworkId,
    ) -> NodeFlows {
        let intents =
            self.state.lock().programmed_intents(&(node_id, network_id));
        let mut flows = NodeFlows::default();
        for intent in intents {
            flows.insert(intent);
        }
        flows
    }

    // Binds a host port to the ND service. Returns true if the binding was
    // programmed.
    pub fn bind_service(&self, port_id: PortId) -> bool {
        let mut state = self.state.lock();
        state.bindings_wanted.insert(port_id);
        if state.bindings.contains(&port_id) {
            return false;
        }
        self.bind(&mut state, port_id)
    }

    // Unbinds a host port from the ND service. Returns true if the unbinding
    // was programmed.
    pub fn unbind_service(&self, port_id: PortId) -> bool {
        let mut state = self.state.lock();
        state.bindings_wanted.remove(&port_id);
        if !state.bindings.contains(&port_id) {
            return false;
        }
        self.unbind(&mut state, port_id)
    }

    pub fn is_bound(&self, port_id: &PortId) -> bool {
        self.state.lock().bindings.contains(port_id)
    }

    // The helpers below are called with the state lock held so that calls
    // for the same node reach the programmer in the order the transitions
    // happened.

    fn install(
        &self,
        state: &mut FlowState,
        key: FlowKey,
        elan_tag: Option<ElanTag>,
        intent: FlowIntent,
    ) -> bool {
        let (node_id, network_id) = key;
        if !self.leadership.is_leader() {
            return false;
        }
        let Some(elan_tag) = elan_tag else {
            Error::ElanTagNotFound(network_id).log();
            return false;
        };

        let flow = intent.descriptor(elan_tag);
        Debug::FlowRequest(node_id, &flow).log();
        if let Err(error) = self.programmer.request(node_id, &flow) {
            Error::from(IoError::FlowRequestError(node_id, error)).log();
            return false;
        }
        state.programmed.entry(key).or_default().insert(intent, flow);
        true
    }

    fn uninstall(
        &self,
        state: &mut FlowState,
        key: FlowKey,
        intent: FlowIntent,
    ) -> bool {
        let (node_id, _) = key;
        if !self.leadership.is_leader() {
            return false;
        }
        let Some(flows) = state.programmed.get_mut(&key) else {
            return false;
        };
        let Some(flow) = flows.get(&intent).copied() else {
            return false;
        };

        Debug::FlowRetract(node_id, &flow).log();
        if let Err(error) = self.programmer.retract(node_id, &flow) {
            Error::from(IoError::FlowRetractError(node_id, error)).log();
            return false;
        }
        flows.remove(&intent);
        if flows.is_empty() {
            state.programmed.remove(&key);
        }
        true
    }

    fn bind(&self, state: &mut FlowState, port_id: PortId) -> bool {
        if !self.leadership.is_leader() {
            return false;
        }
        Debug::ServiceBind(&port_id).log();
        if let Err(error) = self.programmer.bind_service(port_id) {
            Error::from(IoError::ServiceBindError(port_id, error)).log();
            return false;
        }
        state.bindings.insert(port_id);
        true
    }

    fn unbind(&self, state: &mut FlowState, port_id: PortId) -> bool {
        if !self.leadership.is_leader() {
            return false;
        }
        Debug::ServiceUnbind(&port_id).log();
        if let Err(error) = self.programmer.unbind_service(port_id) {
            Error::from(IoError::ServiceUnbindError(port_id, error)).log();
            return false;
        }
        state.bindings.remove(&port_id);
        true
    }
}

// ===== impl FlowState =====

impl FlowState {
    fn keys(&self) -> BTreeSet<FlowKey> {
        self.wanted
            .keys()
            .chain(self.programmed.keys())
            .copied()
            .collect()
    }

    fn is_programmed(&self, key: &FlowKey, intent: &FlowIntent) -> bool {
        self.programmed
            .get(key)
            .is_some_and(|flows| flows.contains_key(intent))
    }

    fn programmed_intents(&self, key: &FlowKey) -> Vec<FlowIntent> {
        self.programmed
            .get(key)
            .map(|flows| flows.keys().copied().collect())
            .unwrap_or_default()
    }
}

// ===== unit tests =====
