//! ESP32-specific components for the echolink server.
//!
//! This crate implements the platform seams of `echolink-core` and
//! `echolink-server` on ESP-IDF:
//! - NVS-backed credential store
//! - Wi-Fi station driver with fixed addressing and event subscriptions
//! - Task watchdog liveness
//! - lwIP socket tuning (backlog, keep-alive)
//!
//! # Example
//!
//! ```ignore
//! use echolink_esp32::nvs::NvsCredentialStore;
//! use echolink_esp32::wifi::EspStation;
//!
//! let store = NvsCredentialStore::new(nvs_partition, "esp32s3");
//! let station = EspStation::new(peripherals.modem, sysloop, sender)?;
//! ```

pub mod nvs;
pub mod socket;
pub mod watchdog;
pub mod wifi;
