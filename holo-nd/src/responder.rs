//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::atomic::Ordering;

use crate::advertisement::{self, RaKind, RouterContext};
use crate::debug::Debug;
use crate::error::Error;
use crate::instance::InstanceInner;
use crate::packet::{self, IcmpV6Kind, Packet};
use crate::southbound::{Egress, IngressHandle};

// ===== global functions =====

// Answers a punted neighbor or router solicitation.
//
// The frame is decoded and its checksum verified, the ingress port and the
// router interface of its network are resolved, and the reply is sent back
// through the ingress handle. Any failure terminates processing early; the
// caller only logs it.
pub(crate) fn process_packet(
    instance: &InstanceInner,
    ingress: &IngressHandle,
    data: &[u8],
) -> Result<(), Error> {
    let Some(kind) = packet::classify(data) else {
        return Ok(());
    };

    // Decode and validate.
    let frame = match kind {
        IcmpV6Kind::NeighborSolicitation => packet::decode_ns(data)?,
        IcmpV6Kind::RouterSolicitation => packet::decode_rs(data)?,
    };
    Debug::PacketRx(ingress, &frame.packet).log();
    let stats = &instance.statistics;
    match kind {
        IcmpV6Kind::NeighborSolicitation => {
            stats.ns_rcvd.fetch_add(1, Ordering::Relaxed);
        }
        IcmpV6Kind::RouterSolicitation => {
            stats.rs_rcvd.fetch_add(1, Ordering::Relaxed);
        }
    }

    // Resolve the ingress port.
    let topology = &instance.topology;
    let port_id = instance
        .southbound
        .resolver
        .port_by_lport_tag(ingress.lport_tag)
        .ok_or(Error::UnknownLportTag(ingress.lport_tag))?;
    let port = topology
        .port_by_id(&port_id)
        .ok_or(Error::PortNotFound(port_id))?;

    // Resolve the router interface of the port's network.
    let router_port = topology
        .router_interface_for_network(&port.network_id)
        .and_then(|router_port_id| topology.port_by_id(&router_port_id))
        .ok_or(Error::RouterInterfaceNotFound(port.network_id))?;

    let egress = Egress::Ingress(ingress.clone());
    match &frame.packet {
        Packet::NeighborSolicitation(ns) => {
            // Only answer for addresses the router owns.
            if !router_port.owns_address(&ns.target) {
                return Err(Error::TargetNotOwned(router_port.id, ns.target));
            }
            let reply = advertisement::solicited_neighbor_advertisement(
                &router_port,
                &frame,
                ns,
            );
            if instance.send_frame(egress, &reply)? {
                stats.na_sent.fetch_add(1, Ordering::Relaxed);
            }
        }
        Packet::RouterSolicitation(_) => {
            let subnets = topology.subnets_of_port(&router_port.id);
            let mtu = topology
                .network_by_id(&router_port.network_id)
                .map(|network| network.mtu)
                .unwrap_or(0);
            let router = RouterContext {
                port: &router_port,
                subnets: &subnets,
                mtu,
            };
            let reply = advertisement::router_advertisement(
                &instance.config,
                RaKind::Solicited,
                router,
                Some((frame.src_mac, frame.src_ip)),
            );
            if instance.send_frame(egress, &reply)? {
                stats.ra_sent.fetch_add(1, Ordering::Relaxed);
            }
        }
        // Filtered out by the classifier.
        _ => (),
    }

    Ok(())
}
