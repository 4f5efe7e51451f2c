//! Service counters, shared between the worker and its owner.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct ServiceStats {
    listening: AtomicBool,
    client_connected: AtomicBool,
    binds: AtomicUsize,
    accepted: AtomicUsize,
    echoed: AtomicUsize,
    send_failures: AtomicUsize,
}

/// Point-in-time copy of [`ServiceStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub listening: bool,
    pub client_connected: bool,
    pub binds: usize,
    pub accepted: usize,
    pub echoed: usize,
    pub send_failures: usize,
}

impl ServiceStats {
    /// True while a listening socket is held.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    pub fn has_client(&self) -> bool {
        self.client_connected.load(Ordering::Acquire)
    }

    /// Successful binds since the service was created.
    pub fn binds(&self) -> usize {
        self.binds.load(Ordering::Acquire)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Acquire)
    }

    pub fn echoed(&self) -> usize {
        self.echoed.load(Ordering::Acquire)
    }

    pub fn send_failures(&self) -> usize {
        self.send_failures.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            listening: self.is_listening(),
            client_connected: self.has_client(),
            binds: self.binds(),
            accepted: self.accepted(),
            echoed: self.echoed(),
            send_failures: self.send_failures(),
        }
    }

    pub(crate) fn listener_bound(&self) {
        self.binds.fetch_add(1, Ordering::AcqRel);
        self.listening.store(true, Ordering::Release);
    }

    pub(crate) fn listener_released(&self) {
        self.listening.store(false, Ordering::Release);
    }

    pub(crate) fn client_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::AcqRel);
        self.client_connected.store(true, Ordering::Release);
    }

    pub(crate) fn client_released(&self) {
        self.client_connected.store(false, Ordering::Release);
    }

    pub(crate) fn record_echo(&self) {
        self.echoed.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::AcqRel);
    }
}
