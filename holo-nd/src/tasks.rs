//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use bytes::Bytes;
use holo_utils::task::Task;
use holo_utils::{Receiver, Sender};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{Instrument, debug_span};

use crate::error::Error;
use crate::instance::InstanceInner;
use crate::southbound::IngressHandle;

//
// ND tasks diagram:
//
//                      +--------------+
//   receive() -------> | packet queue | ----> (Nx) packet_worker
//                      +--------------+              |
//                                                    V
//                                             responder -> transport
//
//   (Nx) advertisement timer ------------------> advertisement -> transport
//

// Punted frame waiting to be processed.
#[derive(Debug)]
pub struct PacketMsg {
    pub ingress: IngressHandle,
    pub data: Bytes,
}

// Bounded pool of packet workers sharing one queue.
#[derive(Debug)]
pub(crate) struct PacketWorkers {
    packet_txp: Sender<PacketMsg>,
    _workers: Vec<Task<()>>,
}

// ===== impl PacketWorkers =====

impl PacketWorkers {
    // Enqueues a frame without blocking the receive path.
    pub(crate) fn try_send(&self, msg: PacketMsg) -> Result<(), Error> {
        self.packet_txp.try_send(msg).map_err(|error| match error {
            TrySendError::Full(_) | TrySendError::Closed(_) => Error::QueueFull,
        })
    }
}

// ===== ND tasks =====

// Spawns the packet workers.
//
// Workers are supervised: one panicking while processing a frame is
// restarted and only that frame is lost.
pub(crate) fn packet_workers(
    handle: &Handle,
    count: usize,
    queue_size: usize,
    instance: Arc<InstanceInner>,
) -> PacketWorkers {
    let (packet_txp, packet_rxp) =
        tokio::sync::mpsc::channel(queue_size.max(1));
    let packet_rxp = Arc::new(tokio::sync::Mutex::new(packet_rxp));

    let workers = (0..count.max(1))
        .map(|worker_id| {
            let packet_rxp = packet_rxp.clone();
            let instance = instance.clone();
            Task::spawn_supervised(handle, move || {
                let span = debug_span!("packet-worker", id = worker_id);
                packet_worker(instance.clone(), packet_rxp.clone())
                    .instrument(span)
            })
        })
        .collect();

    PacketWorkers {
        packet_txp,
        _workers: workers,
    }
}

async fn packet_worker(
    instance: Arc<InstanceInner>,
    packet_rxp: Arc<tokio::sync::Mutex<Receiver<PacketMsg>>>,
) {
    loop {
        // Hold the receiver only while waiting for the next frame.
        let msg = packet_rxp.lock().await.recv().await;
        let Some(msg) = msg else {
            break;
        };
        if let Err(error) = instance.process_packet(&msg.ingress, &msg.data) {
            error.log();
        }
    }
}
