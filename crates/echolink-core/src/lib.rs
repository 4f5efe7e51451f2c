//! # echolink-core
//!
//! Core pieces of the link-gated echo service.
//!
//! This crate provides:
//! - The Wi-Fi link state machine and the Link State Manager
//! - Credential storage abstraction with per-key default fallback
//! - Configuration types
//! - Echo wire format
//! - Liveness (watchdog) contract
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio) and ESP32 (esp-idf) targets.

pub mod config;
pub mod credentials;
pub mod echo;
pub mod file_store;
pub mod link;
pub mod liveness;
pub mod manager;
pub mod station;

pub use config::{AppConfig, KeepaliveConfig, ServiceConfig, StaticIpConfig, StationConfig};
pub use credentials::{
    load_station_credentials, CredentialError, CredentialStore, MemoryCredentialStore,
    StationCredentials,
};
pub use file_store::FileCredentialStore;
pub use link::{LinkEvent, LinkState, LinkStateCell};
pub use liveness::{Liveness, NoopLiveness};
pub use manager::{LinkError, LinkEventSender, LinkService, LinkStateManager, StationDriver};
pub use station::LoopbackStation;
