//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::time::Duration;

use holo_utils::task::{IntervalTask, SharedPeriod};
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::debug::Debug;
use crate::topology::PortId;

// Per-port advertisement timers.
//
// All timers share the same period. Changing it doesn't restart them: each
// timer uses the new value the next time it re-arms itself.
pub struct Scheduler {
    handle: Handle,
    period: SharedPeriod,
    timers: Mutex<HashMap<PortId, IntervalTask>>,
}

// ===== impl Scheduler =====

impl Scheduler {
    pub fn new(handle: Handle, period: Duration) -> Scheduler {
        Scheduler {
            handle,
            period: SharedPeriod::new(period),
            timers: Default::default(),
        }
    }

    // Arms the timer of a port. Returns false if it's already armed.
    //
    // The callback must not cancel its own timer.
    pub fn start<F>(&self, port_id: PortId, cb: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut timers = self.timers.lock();
        if timers.contains_key(&port_id) {
            return false;
        }
        let timer = IntervalTask::new(&self.handle, self.period.clone(), cb);
        timers.insert(port_id, timer);
        Debug::TimerStart(&port_id).log();
        true
    }

    // Cancels the timer of a port. If the timer is firing on another thread,
    // this waits for the callback to return.
    pub fn cancel(&self, port_id: &PortId) -> bool {
        // Release the map before waiting on the timer.
        let Some(timer) = self.timers.lock().remove(port_id) else {
            return false;
        };
        timer.cancel();
        Debug::TimerCancel(port_id).log();
        true
    }

    pub fn cancel_all(&self) {
        let timers = std::mem::take(&mut *self.timers.lock());
        for timer in timers.values() {
            timer.cancel();
        }
    }

    pub fn period(&self) -> Duration {
        self.period.get()
    }

    pub fn set_period(&self, period: Duration) {
        self.period.set(period);
    }

    pub fn is_armed(&self, port_id: &PortId) -> bool {
        self.timers.lock().contains_key(port_id)
    }

    // Number of times the timer of a port has fired.
    pub fn fired(&self, port_id: &PortId) -> Option<u64> {
        self.timers.lock().get(port_id).map(|timer| timer.fired())
    }

    pub fn len(&self) -> usize {
        self.timers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.lock().is_empty()
    }
}
