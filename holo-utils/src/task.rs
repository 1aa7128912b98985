//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task;
use tokio::time::Instant;
use tracing::{Instrument, error};

/// A handle which can be used to manipulate the task created by the
/// [`Task::spawn_on`] and [`Task::spawn_supervised`] functions.
///
/// Dropping this handle cancels the task.
#[derive(Debug)]
pub struct Task<T> {
    join_handle: task::JoinHandle<T>,
}

/// A period shared between the owner of a set of interval tasks and the
/// tasks themselves.
///
/// Updating the period doesn't interrupt sleeping tasks: each task picks up
/// the new value the next time it re-arms itself.
#[derive(Clone, Debug)]
pub struct SharedPeriod(Arc<AtomicU64>);

/// A handle which can be used to manipulate the interval task created by the
/// [`IntervalTask::new`] function.
///
/// Dropping this handle cancels the interval task.
#[derive(Debug)]
pub struct IntervalTask {
    _task: Task<()>,
    control: Arc<Mutex<Control>>,
}

#[derive(Debug)]
struct Control {
    cancelled: bool,
    next: Instant,
    fired: u64,
}

// ===== impl Task =====

impl<T> Task<T> {
    /// Spawns a new asynchronous task on the given runtime, returning a
    /// handle for it.
    ///
    /// This can be called from threads that don't belong to the runtime.
    pub fn spawn_on<Fut>(handle: &Handle, future: Fut) -> Task<T>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Task {
            join_handle: handle.spawn(future),
        }
    }

    /// Spawns a supervised task that automatically restarts if it panics.
    /// The task will terminate if it completes successfully or returns an
    /// error.
    ///
    /// Packet workers use this so that a malformed frame triggering a bug
    /// only costs that frame, not the whole worker.
    pub fn spawn_supervised<F, Fut>(handle: &Handle, spawn_fn: F) -> Task<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let child_handle = handle.clone();
        let join_handle = handle.spawn(
            async move {
                loop {
                    let worker_task = Task::spawn_on(&child_handle, spawn_fn());
                    match worker_task.await {
                        Ok(_) => {
                            // Finished without panic.
                            break;
                        }
                        Err(error) if error.is_panic() => {
                            error!("task panicked, restarting...");
                            continue;
                        }
                        Err(error) => {
                            error!(%error, "task failed");
                            break;
                        }
                    }
                }
            }
            .in_current_span(),
        );
        Task { join_handle }
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, task::JoinError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        Pin::new(&mut self.join_handle).poll(cx)
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

// ===== impl SharedPeriod =====

impl SharedPeriod {
    pub fn new(period: Duration) -> SharedPeriod {
        SharedPeriod(Arc::new(AtomicU64::new(Self::to_millis(period))))
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, period: Duration) {
        self.0.store(Self::to_millis(period), Ordering::Relaxed);
    }

    // Zero periods would turn interval tasks into busy loops.
    fn to_millis(period: Duration) -> u64 {
        u64::try_from(period.as_millis()).unwrap_or(u64::MAX).max(1)
    }
}

// ===== impl IntervalTask =====

impl IntervalTask {
    /// Spawns a new task that calls the provided closure every time the
    /// shared period elapses. The task re-arms itself after each call,
    /// reading the period anew, until it's cancelled.
    ///
    /// The closure runs with the task's cancel guard held: once
    /// [`IntervalTask::cancel`] returns, the closure is neither running nor
    /// going to run again.
    ///
    /// Returns a handler that can be used to manipulate the interval task.
    pub fn new<F>(handle: &Handle, period: SharedPeriod, cb: F) -> IntervalTask
    where
        F: Fn() + Send + Sync + 'static,
    {
        let control = Arc::new(Mutex::new(Control {
            cancelled: false,
            next: Instant::now() + period.get(),
            fired: 0,
        }));
        let control_child = control.clone();

        let task = Task::spawn_on(
            handle,
            async move {
                loop {
                    let next = control_child.lock().next;
                    tokio::time::sleep_until(next).await;

                    let mut control = control_child.lock();
                    if control.cancelled {
                        break;
                    }
                    (cb)();
                    control.fired += 1;
                    control.next = Instant::now() + period.get();
                }
            }
            .in_current_span(),
        );

        IntervalTask {
            _task: task,
            control,
        }
    }

    /// Cancels the interval task.
    ///
    /// If the closure is running on another thread, this waits for it to
    /// return. Cancelling an already cancelled task is a no-op.
    pub fn cancel(&self) {
        let mut control = self.control.lock();
        control.cancelled = true;
    }

    /// Returns true if the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.control.lock().cancelled
    }

    /// Returns how many times the closure has been called.
    pub fn fired(&self) -> u64 {
        self.control.lock().fired
    }
}

impl Drop for IntervalTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ===== unit tests =====
