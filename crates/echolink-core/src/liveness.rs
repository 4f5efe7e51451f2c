//! Liveness contract with the supervising watchdog.
//!
//! Every long-running loop calls [`Liveness::enter`] once from its own
//! thread, [`Liveness::ping`] on every iteration and [`Liveness::leave`]
//! before the thread exits. A thread left registered after exiting trips
//! the watchdog.

use std::sync::atomic::{AtomicUsize, Ordering};

pub trait Liveness: Send + Sync {
    /// Register the calling thread with the watchdog.
    fn enter(&self) {}

    /// Reset the watchdog for the calling thread.
    fn ping(&self);

    /// Unregister the calling thread from the watchdog.
    fn leave(&self) {}
}

/// Liveness for hosts without a watchdog.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLiveness;

impl Liveness for NoopLiveness {
    fn ping(&self) {}
}

/// Counts registrations and pings; useful for asserting that a loop keeps
/// yielding and unregisters on exit.
#[derive(Debug, Default)]
pub struct PingCounter {
    enters: AtomicUsize,
    pings: AtomicUsize,
    leaves: AtomicUsize,
}

impl PingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.pings.load(Ordering::Relaxed)
    }

    pub fn enters(&self) -> usize {
        self.enters.load(Ordering::Acquire)
    }

    pub fn leaves(&self) -> usize {
        self.leaves.load(Ordering::Acquire)
    }
}

impl Liveness for PingCounter {
    fn enter(&self) {
        self.enters.fetch_add(1, Ordering::AcqRel);
    }

    fn ping(&self) {
        self.pings.fetch_add(1, Ordering::Relaxed);
    }

    fn leave(&self) {
        self.leaves.fetch_add(1, Ordering::AcqRel);
    }
}
