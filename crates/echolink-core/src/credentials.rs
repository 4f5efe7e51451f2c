//! Credential storage abstraction.
//!
//! Network credentials are plain string key/value pairs kept in a
//! platform store:
//! - Linux: JSON file (`FileCredentialStore`)
//! - ESP32: NVS namespace
//! - Tests: `MemoryCredentialStore`
//!
//! The store never retries and never substitutes values. Falling back to
//! compiled defaults is the caller's decision, made per key in
//! [`load_station_credentials`].

use std::collections::HashMap;
use std::fmt;

use heapless::String as BoundedString;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::StationConfig;

/// Maximum network identifier length in bytes.
pub const SSID_CAPACITY: usize = 32;
/// Maximum network secret length in bytes.
pub const PASSPHRASE_CAPACITY: usize = 64;
/// Maximum key length accepted by the backing stores.
pub const MAX_KEY_LEN: usize = 15;

pub type Ssid = BoundedString<SSID_CAPACITY>;
pub type Passphrase = BoundedString<PASSPHRASE_CAPACITY>;

/// Errors reported by a credential store.
///
/// `Unavailable`, `NotFound` and `BufferTooSmall` are kept distinct so callers
/// can tell a missing namespace from a missing key from an oversized value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Credential storage unavailable: {0}")]
    Unavailable(String),

    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Stored value for '{key}' does not fit in {capacity} bytes")]
    BufferTooSmall { key: String, capacity: usize },

    #[error("Invalid credential key: {0:?}")]
    InvalidKey(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Validated store key (1..=15 bytes, no NUL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CredentialKey<'a>(&'a str);

impl<'a> CredentialKey<'a> {
    pub fn new(key: &'a str) -> Result<Self, CredentialError> {
        if key.is_empty() || key.len() > MAX_KEY_LEN || key.contains('\0') {
            return Err(CredentialError::InvalidKey(key.to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }
}

impl fmt::Display for CredentialKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Key/value credential storage.
///
/// All methods are synchronous to support embedded platforms.
pub trait CredentialStore {
    /// Read the value stored under `key` into a string of capacity `N`.
    ///
    /// Repeated calls return the same value until [`CredentialStore::set`]
    /// is called for that key.
    fn get<const N: usize>(&self, key: &str) -> Result<BoundedString<N>, CredentialError>;

    /// Store `value` under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), CredentialError>;
}

/// Copy a stored value into a bounded string, reporting overflow.
pub fn bounded<const N: usize>(
    key: &str,
    value: &str,
) -> Result<BoundedString<N>, CredentialError> {
    BoundedString::try_from(value).map_err(|_| CredentialError::BufferTooSmall {
        key: key.to_string(),
        capacity: N,
    })
}

/// In-memory store for hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    entries: Option<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            entries: Some(HashMap::new()),
        }
    }

    /// A store whose namespace cannot be opened.
    pub fn unavailable() -> Self {
        Self { entries: None }
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        if let Some(entries) = self.entries.as_mut() {
            entries.insert(key.to_string(), value.to_string());
        }
        self
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get<const N: usize>(&self, key: &str) -> Result<BoundedString<N>, CredentialError> {
        let key = CredentialKey::new(key)?;
        let entries = self
            .entries
            .as_ref()
            .ok_or_else(|| CredentialError::Unavailable("memory namespace closed".to_string()))?;
        let value = entries
            .get(key.as_str())
            .ok_or_else(|| CredentialError::NotFound(key.to_string()))?;
        bounded(key.as_str(), value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CredentialError> {
        let key = CredentialKey::new(key)?;
        let entries = self
            .entries
            .as_mut()
            .ok_or_else(|| CredentialError::Unavailable("memory namespace closed".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Where a loaded credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Persisted,
    Default,
}

impl CredentialSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Persisted => "persisted",
            Self::Default => "default",
        }
    }
}

/// Credentials handed to the station driver.
#[derive(Clone, PartialEq, Eq)]
pub struct StationCredentials {
    pub ssid: Ssid,
    pub passphrase: Passphrase,
    pub ssid_source: CredentialSource,
    pub passphrase_source: CredentialSource,
}

impl fmt::Debug for StationCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationCredentials")
            .field("ssid", &self.ssid)
            .field("passphrase", &"<redacted>")
            .field("ssid_source", &self.ssid_source)
            .field("passphrase_source", &self.passphrase_source)
            .finish()
    }
}

/// Load the network identifier and secret, falling back to the compiled
/// defaults independently for each key.
pub fn load_station_credentials<S: CredentialStore>(
    store: &S,
    config: &StationConfig,
) -> StationCredentials {
    let (ssid, ssid_source) = load_or_default::<S, SSID_CAPACITY>(
        store,
        &config.ssid_key,
        &config.default_ssid,
    );
    info!(source = ssid_source.as_str(), ssid = %ssid, "Network identifier loaded");

    let (passphrase, passphrase_source) = load_or_default::<S, PASSPHRASE_CAPACITY>(
        store,
        &config.passphrase_key,
        &config.default_passphrase,
    );
    info!(source = passphrase_source.as_str(), "Network secret loaded");

    StationCredentials {
        ssid,
        passphrase,
        ssid_source,
        passphrase_source,
    }
}

fn load_or_default<S: CredentialStore, const N: usize>(
    store: &S,
    key: &str,
    default: &str,
) -> (BoundedString<N>, CredentialSource) {
    match store.get::<N>(key) {
        Ok(value) => (value, CredentialSource::Persisted),
        Err(e) => {
            warn!(key, error = %e, "Credential unavailable, using compiled default");
            // Defaults are length-checked by StationConfig::validate; truncate
            // rather than fail if an unvalidated config slips through.
            let mut value = BoundedString::new();
            for ch in default.chars() {
                if value.push(ch).is_err() {
                    break;
                }
            }
            (value, CredentialSource::Default)
        }
    }
}

/// Probe key used by [`verify_store`].
pub const PROBE_KEY: &str = "test";
const PROBE_VALUE: &str = "testnvs";

/// Write a probe value and read it back.
///
/// Boot diagnostic only; the result is meant to be logged, never acted on.
pub fn verify_store<S: CredentialStore>(store: &mut S) -> Result<(), CredentialError> {
    store.set(PROBE_KEY, PROBE_VALUE)?;
    let read: BoundedString<16> = store.get(PROBE_KEY)?;
    if read.as_str() != PROBE_VALUE {
        return Err(CredentialError::Storage(format!(
            "probe mismatch: wrote {:?}, read {:?}",
            PROBE_VALUE,
            read.as_str()
        )));
    }
    Ok(())
}
