//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use const_addrs::ip6;
use holo_nd::consts::DEVICE_OWNER_ROUTER_INTF;
use holo_nd::events::TopologyEvent;
use holo_nd::flows::FlowDescriptor;
use holo_nd::packet::RouterAdvertisement;
use holo_nd::southbound::Egress;
use holo_nd::topology::subnet::Ipv6Mode;
use uuid::Uuid;

use crate::common::*;

//
// Helper functions.
//

fn flood() -> Egress {
    Egress::Flood {
        network_id: NETWORK1,
        elan_tag: ELAN_TAG1,
    }
}

// Returns the router advertisements sent so far.
fn take_advertisements(stubs: &Stubs) -> Vec<RouterAdvertisement> {
    stubs
        .take_sent()
        .into_iter()
        .map(|(egress, frame)| {
            assert_eq!(egress, flood());
            frame.packet.into_router_advertisement().unwrap()
        })
        .collect()
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

//
// Tests.
//

#[tokio::test(start_paused = true)]
async fn test_periodic_advertisement() {
    let stubs = Stubs::new();
    let instance = instance(&stubs);
    setup_network(&instance, &stubs);
    assert!(instance.scheduler().is_armed(&ROUTER_PORT1));
    assert_eq!(instance.scheduler().len(), 1);

    sleep_secs(59).await;
    assert!(take_advertisements(&stubs).is_empty());

    sleep_secs(2).await;
    let ras = take_advertisements(&stubs);
    assert_eq!(ras.len(), 1);
    assert_eq!(ras[0].router_lifetime, 4500);
    assert_eq!(ras[0].mtu, Some(1500));
    assert_eq!(instance.scheduler().fired(&ROUTER_PORT1), Some(1));

    sleep_secs(120).await;
    assert_eq!(take_advertisements(&stubs).len(), 2);
    assert_eq!(instance.statistics().ra_sent, 3);
}

#[tokio::test(start_paused = true)]
async fn test_follower_timer() {
    let stubs = Stubs::new();
    let instance = instance(&stubs);
    setup_network(&instance, &stubs);
    stubs.set_leader(false);

    sleep_secs(61).await;
    assert!(take_advertisements(&stubs).is_empty());
    assert_eq!(instance.scheduler().fired(&ROUTER_PORT1), Some(1));

    // Leadership regained.
    stubs.set_leader(true);
    sleep_secs(60).await;
    assert_eq!(take_advertisements(&stubs).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_interval_change() {
    let stubs = Stubs::new();
    let instance = instance(&stubs);
    setup_network(&instance, &stubs);

    // The armed tick keeps the old period.
    instance.set_ra_interval(Duration::from_secs(10));
    assert_eq!(instance.scheduler().period(), Duration::from_secs(10));
    sleep_secs(59).await;
    assert!(take_advertisements(&stubs).is_empty());

    sleep_secs(2).await;
    assert_eq!(take_advertisements(&stubs).len(), 1);
    sleep_secs(10).await;
    assert_eq!(take_advertisements(&stubs).len(), 1);
    sleep_secs(30).await;
    assert_eq!(take_advertisements(&stubs).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_remove_port_ceases() {
    let stubs = Stubs::new();
    let instance = instance(&stubs);
    setup_network(&instance, &stubs);

    let port = instance.remove_port(ROUTER_PORT1).unwrap();
    assert!(port.is_router_interface);
    assert!(!instance.scheduler().is_armed(&ROUTER_PORT1));
    assert!(instance.scheduler().is_empty());

    let ras = take_advertisements(&stubs);
    assert_eq!(ras.len(), 1);
    assert_eq!(ras[0].router_lifetime, 0);
    assert_eq!(ras[0].prefixes.len(), 1);

    let retracted = [
        FlowDescriptor::RsPunt {
            elan_tag: ELAN_TAG1,
        },
        FlowDescriptor::NdPunt {
            elan_tag: ELAN_TAG1,
            target: const_addrs::ip6!("2001:db8::1"),
        },
        FlowDescriptor::NdPunt {
            elan_tag: ELAN_TAG1,
            target: const_addrs::ip6!("fe80::f816:3eff:fe00:1"),
        },
    ];
    assert_eq!(
        stubs.take_flow_calls(),
        retracted
            .into_iter()
            .map(|flow| FlowCall::Retract(NODE1, flow))
            .collect::<Vec<_>>()
    );

    // No advertisement after the cease one.
    sleep_secs(180).await;
    assert!(take_advertisements(&stubs).is_empty());

    // Duplicate delivery.
    assert!(instance.remove_port(ROUTER_PORT1).is_none());
    assert!(take_advertisements(&stubs).is_empty());
    assert!(stubs.take_flow_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_router_interface_without_ipv6() {
    let stubs = Stubs::new();
    stubs.set_elan_tag(NETWORK1, ELAN_TAG1);
    let instance = instance(&stubs);
    instance.add_network(NETWORK1);
    instance.add_router_interface(
        ROUTER_PORT1,
        ROUTER1,
        SUBNET2,
        NETWORK1,
        "10.0.0.1",
        router_mac(),
        DEVICE_OWNER_ROUTER_INTF,
    );
    stubs.take_sent();

    sleep_secs(61).await;
    assert_eq!(instance.scheduler().fired(&ROUTER_PORT1), Some(1));
    assert!(stubs.take_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_timers() {
    let stubs = Stubs::new();
    let instance = instance(&stubs);
    setup_network(&instance, &stubs);

    drop(instance);
    sleep_secs(120).await;
    assert!(stubs.take_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_router_interface_added_without_addresses() {
    let stubs = Stubs::new();
    stubs.set_elan_tag(NETWORK1, ELAN_TAG1);
    stubs.set_location(ROUTER_PORT1, NODE1, 1);
    let instance = instance(&stubs);
    instance.add_network(NETWORK1);
    instance.update_network(NETWORK1, 1500);
    instance.add_subnet(
        SUBNET1,
        subnet_attrs("2001:db8::/64", Some(Ipv6Mode::Slaac)),
    );
    instance.add_router(ROUTER1, "router1", TENANT1);

    instance.process_topology_event(TopologyEvent::PortAdd {
        port_id: ROUTER_PORT1,
        network_id: NETWORK1,
        router_id: Some(ROUTER1),
        mac: router_mac(),
        fixed_ips: vec![],
        device_owner: DEVICE_OWNER_ROUTER_INTF.to_owned(),
    });
    let port = instance.topology().port_by_id(&ROUTER_PORT1).unwrap();
    assert!(port.is_router_interface);
    assert!(port.location.is_some());
    assert!(instance.scheduler().is_armed(&ROUTER_PORT1));

    // Addresses assigned afterwards.
    instance.process_topology_event(TopologyEvent::PortUpdate {
        port_id: ROUTER_PORT1,
        router_id: Some(ROUTER1),
        fixed_ips: vec![(SUBNET1, "2001:db8::1".to_owned())],
    });
    let port = instance.topology().port_by_id(&ROUTER_PORT1).unwrap();
    assert!(port.owns_address(&ip6!("2001:db8::1")));
    assert_eq!(
        instance.topology().router_interface_for_network(&NETWORK1),
        Some(ROUTER_PORT1)
    );
    let flows = instance.topology().flows().programmed_flows(NODE1, NETWORK1);
    assert!(flows.rs_punt);
    assert!(flows.nd_targets.contains(&ip6!("2001:db8::1")));
    stubs.take_sent();

    sleep_secs(61).await;
    let ras = take_advertisements(&stubs);
    assert_eq!(ras.len(), 1);
    assert_eq!(ras[0].mtu, Some(1500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_add_and_remove() {
    let stubs = Stubs::new();
    stubs.set_elan_tag(NETWORK1, ELAN_TAG1);
    let instance = instance(&stubs);
    instance.add_network(NETWORK1);
    let port_ids = (0..4)
        .map(|i| Uuid::from_u128(0x1000 + i))
        .collect::<Vec<_>>();

    // Each port is added on one thread and removed on another.
    std::thread::scope(|scope| {
        for port_id in &port_ids {
            let instance = &instance;
            scope.spawn(move || {
                for _ in 0..200 {
                    instance.add_router_interface(
                        *port_id,
                        ROUTER1,
                        SUBNET1,
                        NETWORK1,
                        "2001:db8::1",
                        router_mac(),
                        DEVICE_OWNER_ROUTER_INTF,
                    );
                }
            });
            scope.spawn(move || {
                for _ in 0..200 {
                    instance.remove_port(*port_id);
                }
            });
        }
    });

    // A timer is armed exactly for the ports that survived.
    for port_id in &port_ids {
        let exists = instance.topology().port_by_id(port_id).is_some();
        assert_eq!(instance.scheduler().is_armed(port_id), exists);
    }

    for port_id in &port_ids {
        instance.remove_port(*port_id);
    }
    assert!(instance.scheduler().is_empty());
    assert!(instance.topology().port_ids().is_empty());
}
