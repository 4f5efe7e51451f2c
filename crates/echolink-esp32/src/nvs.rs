//! NVS (Non-Volatile Storage) credential store.
//!
//! Credentials live as NVS strings in one namespace. Opening the namespace
//! happens once; if it fails, every later call reports `Unavailable`.

use echolink_core::credentials::{bounded, CredentialError, CredentialKey, CredentialStore};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::sys::{esp_err_t, EspError, ESP_ERR_NVS_INVALID_LENGTH};
use heapless::String as BoundedString;
use log::{error, info};

pub struct NvsCredentialStore {
    nvs: Result<EspNvs<NvsDefault>, String>,
    namespace: String,
}

impl NvsCredentialStore {
    /// Open `namespace` read-write on the default partition.
    pub fn new(partition: EspDefaultNvsPartition, namespace: &str) -> Self {
        let nvs = EspNvs::new(partition, namespace, true).map_err(|e| {
            error!("Impossible to access NVS namespace '{}': {}", namespace, e);
            e.to_string()
        });
        if nvs.is_ok() {
            info!("NVS namespace '{}' opened", namespace);
        }
        Self {
            nvs,
            namespace: namespace.to_string(),
        }
    }

    fn unavailable(namespace: &str, reason: &str) -> CredentialError {
        CredentialError::Unavailable(format!("{}: {}", namespace, reason))
    }
}

fn is_invalid_length(e: &EspError) -> bool {
    e.code() == ESP_ERR_NVS_INVALID_LENGTH as esp_err_t
}

impl CredentialStore for NvsCredentialStore {
    fn get<const N: usize>(&self, key: &str) -> Result<BoundedString<N>, CredentialError> {
        let key = CredentialKey::new(key)?;
        let nvs = self
            .nvs
            .as_ref()
            .map_err(|reason| Self::unavailable(&self.namespace, reason))?;

        // NVS strings carry a NUL terminator.
        let mut buf = vec![0u8; N + 1];
        match nvs.get_str(key.as_str(), &mut buf) {
            Ok(Some(value)) => bounded(key.as_str(), value),
            Ok(None) => Err(CredentialError::NotFound(key.to_string())),
            Err(e) if is_invalid_length(&e) => Err(CredentialError::BufferTooSmall {
                key: key.to_string(),
                capacity: N,
            }),
            Err(e) => {
                error!("Fail to read string '{}' from NVS: {}", key, e);
                Err(CredentialError::Storage(e.to_string()))
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CredentialError> {
        let key = CredentialKey::new(key)?;
        let nvs = self
            .nvs
            .as_mut()
            .map_err(|reason| Self::unavailable(&self.namespace, reason))?;
        // set_str commits before returning.
        nvs.set_str(key.as_str(), value).map_err(|e| {
            error!("Fail to save string '{}' into NVS: {}", key, e);
            CredentialError::Storage(e.to_string())
        })
    }
}
