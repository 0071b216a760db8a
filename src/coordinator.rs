//! Start/stop coordination shared by the orchestrator, the monitor and every worker.
//!
//! A run goes through two gates and one stop signal:
//!
//! 1. **Ready barrier.** Each worker calls [`StartCoordinator::register_ready`] once
//!    its backend connection passed the liveness check. The orchestrator awaits
//!    [`StartCoordinator::wait_all_ready`], which resolves only after exactly
//!    `expected` registrations.
//! 2. **Release.** The orchestrator calls [`StartCoordinator::release_start`] once.
//!    The release is a single `watch` broadcast, so all workers wake together instead
//!    of being woken one by one, and a worker that subscribes late still sees it.
//! 3. **Stop.** The monitor calls [`StartCoordinator::stop`] once the run duration
//!    elapsed. Workers poll [`StartCoordinator::is_stopped`] at the top of every loop
//!    iteration; an in-flight request is never interrupted.
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{watch, Notify};

/// One-way cancellation signal for the timed phase.
///
/// It flips from running to stopped exactly once and never back. The intended
/// caller of [`RunClock::stop`] is the monitor alone.
#[derive(Debug)]
pub struct RunClock {
    stopped: watch::Sender<bool>,
}

impl RunClock {
    pub fn new() -> Self {
        let (stopped, _) = watch::channel(false);
        Self { stopped }
    }

    pub fn stop(&self) {
        self.stopped.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }
}

impl Default for RunClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct StartCoordinator {
    expected: usize,
    ready: AtomicUsize,
    all_ready: Notify,
    release: watch::Sender<bool>,
    clock: RunClock,
}

impl StartCoordinator {
    pub fn new(expected: usize) -> Self {
        let (release, _) = watch::channel(false);
        Self {
            expected,
            ready: AtomicUsize::new(0),
            all_ready: Notify::new(),
            release,
            clock: RunClock::new(),
        }
    }

    /// Called once per worker after its connection is usable.
    pub fn register_ready(&self) {
        let registered = self.ready.fetch_add(1, Ordering::AcqRel) + 1;
        if registered == self.expected {
            // `notify_one` stores a permit, so a waiter arriving later still wakes.
            self.all_ready.notify_one();
        }
    }

    pub fn ready_count(&self) -> usize {
        self.ready.load(Ordering::Acquire)
    }

    /// Block until every expected worker has registered.
    pub async fn wait_all_ready(&self) {
        while self.ready_count() < self.expected {
            self.all_ready.notified().await;
        }
    }

    /// Open the start gate for every worker at once.
    pub fn release_start(&self) {
        self.release.send_replace(true);
    }

    pub fn is_released(&self) -> bool {
        *self.release.borrow()
    }

    /// Block until [`StartCoordinator::release_start`] has been called.
    pub async fn wait_release(&self) {
        let mut rx = self.release.subscribe();
        let _ = rx.wait_for(|released| *released).await;
    }

    /// End the timed phase. Single caller: the monitor.
    pub fn stop(&self) {
        self.clock.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.clock.is_stopped()
    }
}
