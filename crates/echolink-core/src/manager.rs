//! Link State Manager.
//!
//! Owns the station driver and the dependent service, applies link events
//! through [`transition`], and publishes the resulting state. Event
//! callbacks never touch the manager directly: they push events through a
//! [`LinkEventSender`] and the manager drains them on its own task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::StaticIpConfig;
use crate::credentials::StationCredentials;
use crate::link::{transition, LinkAction, LinkEvent, LinkState, LinkStateCell};

/// How often [`LinkStateManager::run_until`] checks its shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Errors raised by a station driver.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Network stack initialization failed: {0}")]
    Init(String),

    #[error("Event registration failed: {0}")]
    EventRegistration(String),

    #[error("Station configuration failed: {0}")]
    Configure(String),

    #[error("Connect request failed: {0}")]
    Connect(String),
}

/// Platform Wi-Fi station.
///
/// Implementations report progress asynchronously as [`LinkEvent`]s; none of
/// these calls wait for the link.
pub trait StationDriver {
    /// Apply credentials and fixed addressing, and register for link events.
    fn configure(
        &mut self,
        credentials: &StationCredentials,
        static_ip: &StaticIpConfig,
    ) -> Result<(), LinkError>;

    /// Start the station interface. Completion arrives as `StationStarted`.
    fn start(&mut self) -> Result<(), LinkError>;

    /// Issue one connect attempt.
    fn connect(&mut self) -> Result<(), LinkError>;
}

/// A service whose lifetime follows the link.
pub trait LinkService {
    type Error: std::error::Error;

    fn start(&mut self) -> Result<(), Self::Error>;

    fn stop(&mut self);
}

/// Cloneable handle used by event callbacks to reach the manager.
#[derive(Debug, Clone)]
pub struct LinkEventSender {
    tx: mpsc::Sender<LinkEvent>,
}

impl LinkEventSender {
    pub fn channel() -> (Self, mpsc::Receiver<LinkEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    /// Deliver an event. Returns false once the manager has gone away.
    pub fn send(&self, event: LinkEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Drives the station through its lifecycle and gates the service on it.
pub struct LinkStateManager<D, S> {
    driver: D,
    service: S,
    link: Arc<LinkStateCell>,
    state: LinkState,
}

impl<D, S> LinkStateManager<D, S>
where
    D: StationDriver,
    S: LinkService,
{
    pub fn new(driver: D, service: S, link: Arc<LinkStateCell>) -> Self {
        link.store(LinkState::Down);
        Self {
            driver,
            service,
            link,
            state: LinkState::Down,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Shared view of the published link state.
    pub fn link(&self) -> Arc<LinkStateCell> {
        self.link.clone()
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Configure and start the station. Any failure here is fatal.
    pub fn start(
        &mut self,
        credentials: &StationCredentials,
        static_ip: &StaticIpConfig,
    ) -> Result<(), LinkError> {
        info!(
            ssid = %credentials.ssid,
            ip = %static_ip.ip,
            gateway = %static_ip.gateway,
            netmask = %static_ip.netmask,
            "Configuring Wi-Fi station"
        );
        self.driver.configure(credentials, static_ip)?;
        self.driver.start()?;
        info!("Wi-Fi station started");
        Ok(())
    }

    /// Apply one event and perform the resulting actions.
    pub fn handle_event(&mut self, event: LinkEvent) {
        let t = transition(self.state, &event);
        self.log_event(&event);

        if t.next != self.state {
            debug!(from = %self.state, to = %t.next, "Link state changed");
        }
        self.state = t.next;
        self.link.store(t.next);

        for action in t.actions {
            self.perform(*action);
        }
    }

    /// Drain events until every sender is gone.
    pub fn run(mut self, events: mpsc::Receiver<LinkEvent>) {
        while let Ok(event) = events.recv() {
            self.handle_event(event);
        }
        info!("Link event channel closed, stopping service");
        self.shut_down();
    }

    /// Drain events until `shutdown` is raised or every sender is gone.
    ///
    /// Used where the station itself keeps a sender alive, so the channel
    /// never closes on its own.
    pub fn run_until(mut self, events: mpsc::Receiver<LinkEvent>, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Acquire) {
            match events.recv_timeout(SHUTDOWN_POLL) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Link event channel closed");
                    break;
                }
            }
        }
        info!("Link manager shutting down, stopping service");
        self.shut_down();
    }

    fn shut_down(&mut self) {
        self.service.stop();
        self.state = LinkState::Down;
        self.link.store(LinkState::Down);
    }

    fn perform(&mut self, action: LinkAction) {
        match action {
            LinkAction::Connect => {
                if let Err(e) = self.driver.connect() {
                    warn!(error = %e, "Connect attempt failed");
                }
            }
            LinkAction::StartService => {
                if let Err(e) = self.service.start() {
                    error!(error = %e, "Failed to start connection service");
                }
            }
            LinkAction::StopService => self.service.stop(),
        }
    }

    fn log_event(&self, event: &LinkEvent) {
        match event {
            LinkEvent::StationStarted => info!("Connecting to Wi-Fi network..."),
            LinkEvent::StationDisconnected => match self.state {
                LinkState::Up => info!("Wi-Fi connection lost, reconnecting..."),
                _ => debug!("Wi-Fi connect attempt failed, retrying"),
            },
            LinkEvent::AddressAcquired(ip) => {
                info!(ip = %ip, "Wi-Fi connection established")
            }
            LinkEvent::PeerJoined { mac, aid } => {
                info!(mac = %format_mac(mac), aid, "Station joined access point")
            }
            LinkEvent::PeerLeft { mac, aid } => {
                info!(mac = %format_mac(mac), aid, "Station left access point")
            }
        }
    }
}

fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}
