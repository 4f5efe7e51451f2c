//! Static configuration for the station and the connection service.
//!
//! Every field has a compiled-in default, so an empty JSON object is a
//! valid configuration. Hosts may load overrides from a file; the device
//! build uses the defaults as-is.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::credentials::{PASSPHRASE_CAPACITY, SSID_CAPACITY};

/// Network identifier used when none is persisted.
pub const DEFAULT_SSID: &str = "echolink-ap";
/// Network secret used when none is persisted.
pub const DEFAULT_PASSPHRASE: &str = "echolink-pass";
/// Credential key holding the network identifier.
pub const DEFAULT_SSID_KEY: &str = "ssid_st";
/// Credential key holding the network secret.
pub const DEFAULT_PASSPHRASE_KEY: &str = "pass_st";
/// Credential namespace.
pub const DEFAULT_NAMESPACE: &str = "esp32s3";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub station: StationConfig,
    pub service: ServiceConfig,
}

impl AppConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.station.validate()?;
        self.service.validate()
    }
}

/// Wi-Fi station configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StationConfig {
    /// Fixed (non-DHCP) addressing for the station interface.
    pub static_ip: StaticIpConfig,
    pub default_ssid: String,
    pub default_passphrase: String,
    pub ssid_key: String,
    pub passphrase_key: String,
    pub namespace: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            static_ip: StaticIpConfig::default(),
            default_ssid: DEFAULT_SSID.to_string(),
            default_passphrase: DEFAULT_PASSPHRASE.to_string(),
            ssid_key: DEFAULT_SSID_KEY.to_string(),
            passphrase_key: DEFAULT_PASSPHRASE_KEY.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl StationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ssid.is_empty() || self.default_ssid.len() > SSID_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "default SSID must be 1..={} bytes",
                SSID_CAPACITY
            )));
        }
        if self.default_passphrase.len() > PASSPHRASE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "default passphrase exceeds {} bytes",
                PASSPHRASE_CAPACITY
            )));
        }
        self.static_ip.prefix_len()?;
        Ok(())
    }
}

/// Static IPv4 settings applied to the station interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticIpConfig {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl Default for StaticIpConfig {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::new(192, 168, 0, 200),
            gateway: Ipv4Addr::new(192, 168, 0, 1),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
        }
    }
}

impl StaticIpConfig {
    /// Netmask as a prefix length. Fails for non-contiguous masks.
    pub fn prefix_len(&self) -> Result<u8, ConfigError> {
        let mask = u32::from(self.netmask);
        let ones = mask.leading_ones();
        if mask.checked_shl(ones).unwrap_or(0) != 0 {
            return Err(ConfigError::Invalid(format!(
                "netmask {} is not a contiguous prefix",
                self.netmask
            )));
        }
        Ok(ones as u8)
    }
}

/// TCP keep-alive parameters applied to every accepted client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepaliveConfig {
    /// Seconds of idle before the first probe.
    pub idle_secs: u32,
    /// Seconds between probes.
    pub interval_secs: u32,
    /// Unanswered probes before the peer is declared dead.
    pub count: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            idle_secs: 5,
            interval_secs: 5,
            count: 10,
        }
    }
}

/// Connection service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    pub port: u16,
    pub backlog: u32,
    /// Receive buffer size; one byte is always left unused.
    pub recv_buffer_size: usize,
    /// Sleep between accept/receive iterations.
    pub poll_interval_ms: u64,
    /// Sleep between link checks while waiting for the link to come up.
    pub link_poll_interval_ms: u64,
    pub keepalive: KeepaliveConfig,
    pub worker_stack_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            backlog: 1,
            recv_buffer_size: 1024,
            poll_interval_ms: 10,
            link_poll_interval_ms: 100,
            keepalive: KeepaliveConfig::default(),
            worker_stack_size: 32 * 1024,
        }
    }
}

impl ServiceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn link_poll_interval(&self) -> Duration {
        Duration::from_millis(self.link_poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recv_buffer_size < 2 {
            return Err(ConfigError::Invalid(
                "recvBufferSize must be at least 2".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 || self.link_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll intervals must be non-zero".to_string(),
            ));
        }
        if self.backlog == 0 {
            return Err(ConfigError::Invalid("backlog must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.service.port, 5000);
        assert_eq!(config.service.backlog, 1);
        assert_eq!(config.service.keepalive.count, 10);
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "service": { "port": 6000, "keepalive": { "idleSecs": 7, "intervalSecs": 3, "count": 2 } },
            "station": { "staticIp": { "ip": "10.0.0.5", "gateway": "10.0.0.1", "netmask": "255.255.0.0" } }
        }"#;
        let config = AppConfig::from_json_str(json).unwrap();

        assert_eq!(config.service.port, 6000);
        assert_eq!(config.service.recv_buffer_size, 1024);
        assert_eq!(config.service.keepalive.idle_secs, 7);
        assert_eq!(config.station.static_ip.ip, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(config.station.static_ip.prefix_len().unwrap(), 16);
        assert_eq!(config.station.default_ssid, DEFAULT_SSID);
    }

    #[test]
    fn test_rejects_tiny_buffer() {
        let err = AppConfig::from_json_str(r#"{"service":{"recvBufferSize":1}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_non_contiguous_netmask() {
        let json = r#"{"station":{"staticIp":{"ip":"10.0.0.5","gateway":"10.0.0.1","netmask":"255.0.255.0"}}}"#;
        assert!(matches!(
            AppConfig::from_json_str(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_default_ssid() {
        let mut config = AppConfig::default();
        config.station.default_ssid = "x".repeat(33);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            AppConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
