//! Loopback station driver.
//!
//! Stands in for the Wi-Fi radio on hosts: starting the station emits
//! `StationStarted` and every successful connect emits `AddressAcquired`
//! with the configured static address. Link loss is injected by the owner
//! through [`LoopbackStation::sender`].

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::config::StaticIpConfig;
use crate::credentials::StationCredentials;
use crate::link::LinkEvent;
use crate::manager::{LinkError, LinkEventSender, StationDriver};

#[derive(Debug)]
pub struct LoopbackStation {
    events: LinkEventSender,
    address: Option<Ipv4Addr>,
    reachable: Arc<AtomicBool>,
    connect_attempts: usize,
}

impl LoopbackStation {
    pub fn new(events: LinkEventSender) -> Self {
        Self {
            events,
            address: None,
            reachable: Arc::new(AtomicBool::new(true)),
            connect_attempts: 0,
        }
    }

    /// Sender for injecting events such as `StationDisconnected`.
    pub fn sender(&self) -> LinkEventSender {
        self.events.clone()
    }

    /// Switch controlling whether connect attempts succeed.
    ///
    /// While unreachable, each connect is answered with
    /// `StationDisconnected`, like an access point that is out of range.
    pub fn reachability(&self) -> Arc<AtomicBool> {
        self.reachable.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts
    }
}

impl StationDriver for LoopbackStation {
    fn configure(
        &mut self,
        credentials: &StationCredentials,
        static_ip: &StaticIpConfig,
    ) -> Result<(), LinkError> {
        debug!(ssid = %credentials.ssid, ip = %static_ip.ip, "Loopback station configured");
        self.address = Some(static_ip.ip);
        Ok(())
    }

    fn start(&mut self) -> Result<(), LinkError> {
        if !self.events.send(LinkEvent::StationStarted) {
            return Err(LinkError::Init("link event channel closed".to_string()));
        }
        Ok(())
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        let address = self
            .address
            .ok_or_else(|| LinkError::Connect("station not configured".to_string()))?;
        self.connect_attempts += 1;

        let event = if self.reachable.load(Ordering::Acquire) {
            LinkEvent::AddressAcquired(address)
        } else {
            LinkEvent::StationDisconnected
        };
        if !self.events.send(event) {
            return Err(LinkError::Connect("link event channel closed".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;
    use crate::credentials::{load_station_credentials, MemoryCredentialStore};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_start_and_connect_emit_events() {
        let (sender, rx) = LinkEventSender::channel();
        let mut station = LoopbackStation::new(sender);
        let creds = load_station_credentials(&MemoryCredentialStore::new(), &StationConfig::default());
        let ip = StaticIpConfig::default();

        station.configure(&creds, &ip).unwrap();
        station.start().unwrap();
        station.connect().unwrap();

        assert_eq!(rx.try_recv().unwrap(), LinkEvent::StationStarted);
        assert_eq!(rx.try_recv().unwrap(), LinkEvent::AddressAcquired(ip.ip));
    }

    #[test]
    fn test_unreachable_answers_with_disconnect() {
        let (sender, rx) = LinkEventSender::channel();
        let mut station = LoopbackStation::new(sender);
        let creds = load_station_credentials(&MemoryCredentialStore::new(), &StationConfig::default());
        station.configure(&creds, &StaticIpConfig::default()).unwrap();
        station.reachability().store(false, Ordering::Release);

        station.connect().unwrap();
        assert_eq!(rx.try_recv().unwrap(), LinkEvent::StationDisconnected);
        assert_eq!(station.connect_attempts(), 1);
    }

    #[test]
    fn test_connect_before_configure_fails() {
        let (sender, _rx) = LinkEventSender::channel();
        let mut station = LoopbackStation::new(sender);
        assert!(matches!(station.connect(), Err(LinkError::Connect(_))));
    }
}
