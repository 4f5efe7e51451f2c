//! Wi-Fi link state machine.
//!
//! Link events arrive asynchronously from the network stack and are fed to
//! the pure [`transition`] function, which returns the next state and the
//! side effects the manager must perform. The resulting state is published
//! through a [`LinkStateCell`] that any task may read.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Station link status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkState {
    Down = 0,
    Connecting = 1,
    Up = 2,
}

impl LinkState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Connecting => "connecting",
            Self::Up => "up",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            2 => Self::Up,
            1 => Self::Connecting,
            _ => Self::Down,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events delivered by the network stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The station interface finished starting.
    StationStarted,
    /// Association lost or a connect attempt failed.
    StationDisconnected,
    /// The interface has an address; the link is usable.
    AddressAcquired(Ipv4Addr),
    /// A peer joined the soft-AP interface.
    PeerJoined { mac: [u8; 6], aid: u16 },
    /// A peer left the soft-AP interface.
    PeerLeft { mac: [u8; 6], aid: u16 },
}

/// Side effects requested by a transition, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Issue a station connect attempt.
    Connect,
    /// Start the connection service.
    StartService,
    /// Stop the connection service, releasing its sockets.
    StopService,
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: LinkState,
    pub actions: &'static [LinkAction],
}

impl Transition {
    const fn to(next: LinkState, actions: &'static [LinkAction]) -> Self {
        Self { next, actions }
    }
}

/// Compute the next state for `event` observed in `state`.
///
/// Reconnection is immediate and unbounded: every disconnect while the
/// station is started yields a fresh `Connect`.
pub fn transition(state: LinkState, event: &LinkEvent) -> Transition {
    use LinkAction::*;
    use LinkState::*;

    match (state, event) {
        (Down | Connecting, LinkEvent::StationStarted) => Transition::to(Connecting, &[Connect]),
        (Up, LinkEvent::StationStarted) => Transition::to(Up, &[]),

        (Connecting, LinkEvent::StationDisconnected) => Transition::to(Connecting, &[Connect]),
        (Up, LinkEvent::StationDisconnected) => {
            Transition::to(Connecting, &[StopService, Connect])
        }
        // Not started yet; a connect would be rejected by the driver.
        (Down, LinkEvent::StationDisconnected) => Transition::to(Down, &[]),

        (Down | Connecting, LinkEvent::AddressAcquired(_)) => {
            Transition::to(Up, &[StartService])
        }
        // Same session, already serving.
        (Up, LinkEvent::AddressAcquired(_)) => Transition::to(Up, &[]),

        (_, LinkEvent::PeerJoined { .. } | LinkEvent::PeerLeft { .. }) => {
            Transition::to(state, &[])
        }
    }
}

/// Process-wide link state, written by the manager and read by anyone.
#[derive(Debug)]
pub struct LinkStateCell {
    state: AtomicU8,
}

impl Default for LinkStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStateCell {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(LinkState::Down as u8),
        }
    }

    pub fn get(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_up(&self) -> bool {
        self.get() == LinkState::Up
    }

    pub(crate) fn store(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 200);

    fn run(events: &[LinkEvent]) -> (LinkState, Vec<LinkAction>) {
        let mut state = LinkState::Down;
        let mut actions = Vec::new();
        for event in events {
            let t = transition(state, event);
            state = t.next;
            actions.extend_from_slice(t.actions);
        }
        (state, actions)
    }

    #[test]
    fn test_boot_to_up() {
        let (state, actions) = run(&[
            LinkEvent::StationStarted,
            LinkEvent::AddressAcquired(IP),
        ]);
        assert_eq!(state, LinkState::Up);
        assert_eq!(actions, vec![LinkAction::Connect, LinkAction::StartService]);
    }

    #[test]
    fn test_disconnect_while_connecting_retries() {
        let (state, actions) = run(&[
            LinkEvent::StationStarted,
            LinkEvent::StationDisconnected,
            LinkEvent::StationDisconnected,
            LinkEvent::StationDisconnected,
        ]);
        assert_eq!(state, LinkState::Connecting);
        assert_eq!(actions, vec![LinkAction::Connect; 4]);
    }

    #[test]
    fn test_link_loss_stops_service_and_reconnects() {
        let t = transition(LinkState::Up, &LinkEvent::StationDisconnected);
        assert_eq!(t.next, LinkState::Connecting);
        assert_eq!(t.actions, &[LinkAction::StopService, LinkAction::Connect]);
        assert!(!t.actions.contains(&LinkAction::StartService));
    }

    #[test]
    fn test_duplicate_address_does_not_restart() {
        let (state, actions) = run(&[
            LinkEvent::StationStarted,
            LinkEvent::AddressAcquired(IP),
            LinkEvent::AddressAcquired(IP),
        ]);
        assert_eq!(state, LinkState::Up);
        let starts = actions
            .iter()
            .filter(|a| **a == LinkAction::StartService)
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_up_down_up_starts_twice() {
        let (state, actions) = run(&[
            LinkEvent::StationStarted,
            LinkEvent::AddressAcquired(IP),
            LinkEvent::StationDisconnected,
            LinkEvent::AddressAcquired(IP),
        ]);
        assert_eq!(state, LinkState::Up);
        assert_eq!(
            actions,
            vec![
                LinkAction::Connect,
                LinkAction::StartService,
                LinkAction::StopService,
                LinkAction::Connect,
                LinkAction::StartService,
            ]
        );
    }

    #[test]
    fn test_disconnect_before_start_is_ignored() {
        let t = transition(LinkState::Down, &LinkEvent::StationDisconnected);
        assert_eq!(t.next, LinkState::Down);
        assert!(t.actions.is_empty());
    }

    #[test]
    fn test_peer_events_never_change_state() {
        let joined = LinkEvent::PeerJoined { mac: [1; 6], aid: 1 };
        let left = LinkEvent::PeerLeft { mac: [1; 6], aid: 1 };
        for state in [LinkState::Down, LinkState::Connecting, LinkState::Up] {
            assert_eq!(transition(state, &joined), Transition::to(state, &[]));
            assert_eq!(transition(state, &left), Transition::to(state, &[]));
        }
    }

    #[test]
    fn test_cell_round_trips_states() {
        let cell = LinkStateCell::new();
        assert_eq!(cell.get(), LinkState::Down);
        for state in [LinkState::Connecting, LinkState::Up, LinkState::Down] {
            cell.store(state);
            assert_eq!(cell.get(), state);
        }
        cell.store(LinkState::Up);
        assert!(cell.is_up());
    }
}
