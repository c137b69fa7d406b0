//! Recurring interval tasks with idempotent cancellation.
//!
//! Used to drive periodic side effects, such as a typing indicator, for as
//! long as a long-running command executes.

use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Spawns recurring tasks on a runtime's timer.
#[derive(Clone)]
pub struct Scheduler {
    runtime: Handle,
}

struct TaskState {
    cancelled: AtomicBool,
    /// Held by the timer loop from the cancellation check until the action
    /// returns.
    gate: Mutex<()>,
    /// Thread currently running the action, if any.
    firing_on: Mutex<Option<ThreadId>>,
    fired: AtomicU64,
    token: CancellationToken,
}

impl Scheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Run `action` every `period`, first after one full period, until the
    /// returned task is cancelled.
    pub fn every<F>(&self, period: Duration, action: F) -> CancelableTask
    where
        F: Fn() + Send + Sync + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let state = Arc::new(TaskState {
            cancelled: AtomicBool::new(false),
            gate: Mutex::new(()),
            firing_on: Mutex::new(None),
            fired: AtomicU64::new(0),
            token: CancellationToken::new(),
        });

        let task = Arc::clone(&state);
        self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task.token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let _gate = task.gate.lock();
                if task.cancelled.load(Ordering::SeqCst) {
                    break;
                }
                *task.firing_on.lock() = Some(thread::current().id());
                task.fired.fetch_add(1, Ordering::SeqCst);
                if let Err(panic) = catch_unwind(AssertUnwindSafe(&action)) {
                    let panic = crate::error::CommandError::from_panic(panic);
                    warn!(error = %panic, "Interval action panicked");
                }
                *task.firing_on.lock() = None;
            }
        });

        CancelableTask { state }
    }

    pub fn every_millis<F>(&self, millis: u64, action: F) -> CancelableTask
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.every(Duration::from_millis(millis), action)
    }
}

/// Handle to a recurring task. Clones share the same task.
#[derive(Clone)]
pub struct CancelableTask {
    state: Arc<TaskState>,
}

impl CancelableTask {
    /// Stop the task. Safe to call repeatedly and from any thread.
    ///
    /// Once this returns no new invocation of the action begins. When called
    /// from another thread while the action runs, waits for that run to end.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.token.cancel();

        let reentrant = *self.state.firing_on.lock() == Some(thread::current().id());
        if !reentrant {
            drop(self.state.gate.lock());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// How many times the action has started.
    pub fn fired(&self) -> u64 {
        self.state.fired.load(Ordering::SeqCst)
    }

    /// Cancel when the returned guard is dropped.
    pub fn guard(self) -> TaskGuard {
        TaskGuard { task: self }
    }
}

/// Cancels its task on drop, including during unwinding.
pub struct TaskGuard {
    task: CancelableTask,
}

impl TaskGuard {
    pub fn task(&self) -> &CancelableTask {
        &self.task
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.task.cancel();
    }
}
