//! Wi-Fi station driver for ESP32.
//!
//! Implements [`StationDriver`] on top of `EspWifi`. Nothing here blocks on
//! the link: station progress is observed through system event loop
//! subscriptions that forward [`LinkEvent`]s to the Link State Manager.

use std::net::Ipv4Addr;

use echolink_core::credentials::StationCredentials;
use echolink_core::{LinkError, LinkEvent, LinkEventSender, StaticIpConfig, StationDriver};
use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    hal::{modem::Modem, peripheral},
    ipv4::{self, ClientSettings, Mask, Subnet},
    netif::{EspNetif, IpEvent, NetifConfiguration},
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent},
};
use log::{debug, info, warn};

pub struct EspStation {
    wifi: Box<EspWifi<'static>>,
    sysloop: EspSystemEventLoop,
    sender: LinkEventSender,
    subscriptions: Vec<EspSubscription<'static, System>>,
}

impl EspStation {
    /// Initialize the Wi-Fi driver with RAM-only driver storage.
    pub fn new(
        modem: impl peripheral::Peripheral<P = Modem> + 'static,
        sysloop: EspSystemEventLoop,
        sender: LinkEventSender,
    ) -> Result<Self, LinkError> {
        let wifi = EspWifi::new(modem, sysloop.clone(), None)
            .map_err(|e| LinkError::Init(e.to_string()))?;
        Ok(Self {
            wifi: Box::new(wifi),
            sysloop,
            sender,
            subscriptions: Vec::new(),
        })
    }

    fn apply_static_ip(&mut self, static_ip: &StaticIpConfig) -> Result<(), LinkError> {
        let prefix = static_ip
            .prefix_len()
            .map_err(|e| LinkError::Configure(e.to_string()))?;

        let netif = EspNetif::new_with_conf(&NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Client(
                ipv4::ClientConfiguration::Fixed(ClientSettings {
                    ip: static_ip.ip,
                    subnet: Subnet {
                        gateway: static_ip.gateway,
                        mask: Mask(prefix),
                    },
                    dns: None,
                    secondary_dns: None,
                }),
            )),
            ..NetifConfiguration::wifi_default_client()
        })
        .map_err(|e| LinkError::Init(e.to_string()))?;

        // The previous DHCP netif is dropped here.
        self.wifi
            .swap_netif_sta(netif)
            .map_err(|e| LinkError::Configure(e.to_string()))?;

        info!(
            "Station address fixed at {}/{} via {}",
            static_ip.ip, prefix, static_ip.gateway
        );
        Ok(())
    }

    fn subscribe_events(&mut self, address: Ipv4Addr) -> Result<(), LinkError> {
        let sender = self.sender.clone();
        let wifi_sub = self
            .sysloop
            .subscribe::<WifiEvent, _>(move |event| {
                let mapped = match event {
                    WifiEvent::StaStarted => Some(LinkEvent::StationStarted),
                    WifiEvent::StaDisconnected { .. } => Some(LinkEvent::StationDisconnected),
                    _ => None,
                };
                if let Some(link_event) = mapped {
                    if !sender.send(link_event) {
                        warn!("Link manager gone, dropping Wi-Fi event");
                    }
                }
            })
            .map_err(|e| LinkError::EventRegistration(e.to_string()))?;

        let sender = self.sender.clone();
        let ip_sub = self
            .sysloop
            .subscribe::<IpEvent, _>(move |event| {
                if let IpEvent::DhcpIpAssigned { .. } = event {
                    if !sender.send(LinkEvent::AddressAcquired(address)) {
                        warn!("Link manager gone, dropping IP event");
                    }
                }
            })
            .map_err(|e| LinkError::EventRegistration(e.to_string()))?;

        self.subscriptions.push(wifi_sub);
        self.subscriptions.push(ip_sub);
        debug!("Subscribed to Wi-Fi and IP events");
        Ok(())
    }
}

impl StationDriver for EspStation {
    fn configure(
        &mut self,
        credentials: &StationCredentials,
        static_ip: &StaticIpConfig,
    ) -> Result<(), LinkError> {
        self.apply_static_ip(static_ip)?;
        self.subscribe_events(static_ip.ip)?;

        let auth_method = if credentials.passphrase.is_empty() {
            info!("WiFi password is empty, using open network");
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: credentials.ssid.clone(),
                password: credentials.passphrase.clone(),
                auth_method,
                ..Default::default()
            }))
            .map_err(|e| LinkError::Configure(e.to_string()))?;

        info!("Station configured for '{}'", credentials.ssid);
        Ok(())
    }

    fn start(&mut self) -> Result<(), LinkError> {
        self.wifi
            .start()
            .map_err(|e| LinkError::Init(e.to_string()))
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        info!("Connecting to access point...");
        self.wifi
            .connect()
            .map_err(|e| LinkError::Connect(e.to_string()))
    }
}
