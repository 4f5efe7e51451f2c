//! File-backed credential store for Linux hosts.
//!
//! One JSON document holds every namespace:
//! `{ "esp32s3": { "ssid_st": "...", "pass_st": "..." } }`.
//! A missing file is an empty store; a file that cannot be read or parsed
//! makes the namespace unavailable.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use heapless::String as BoundedString;
use tracing::debug;

use crate::credentials::{bounded, CredentialError, CredentialKey, CredentialStore};

type Document = BTreeMap<String, BTreeMap<String, String>>;

/// JSON-file credential store scoped to one namespace.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    namespace: String,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>, namespace: &str) -> Self {
        Self {
            path: path.into(),
            namespace: namespace.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Document, CredentialError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                CredentialError::Unavailable(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(CredentialError::Unavailable(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_document(&self, doc: &Document) -> Result<(), CredentialError> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| CredentialError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| CredentialError::Storage(e.to_string()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get<const N: usize>(&self, key: &str) -> Result<BoundedString<N>, CredentialError> {
        let key = CredentialKey::new(key)?;
        let doc = self.read_document()?;
        let value = doc
            .get(&self.namespace)
            .and_then(|ns| ns.get(key.as_str()))
            .ok_or_else(|| CredentialError::NotFound(key.to_string()))?;
        bounded(key.as_str(), value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CredentialError> {
        let key = CredentialKey::new(key)?;
        let mut doc = self.read_document()?;
        doc.entry(self.namespace.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.write_document(&doc)?;
        debug!(key = %key, path = %self.path.display(), "Credential written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("creds.json"), "esp32s3");

        assert_eq!(
            store.get::<32>("ssid_st"),
            Err(CredentialError::NotFound("ssid_st".to_string()))
        );
    }

    #[test]
    fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        let mut store = FileCredentialStore::new(&path, "esp32s3");

        store.set("ssid_st", "harbour").unwrap();
        store.set("pass_st", "mooring-line").unwrap();

        let reopened = FileCredentialStore::new(&path, "esp32s3");
        assert_eq!(reopened.get::<32>("ssid_st").unwrap().as_str(), "harbour");
        assert_eq!(reopened.get::<64>("pass_st").unwrap().as_str(), "mooring-line");
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        FileCredentialStore::new(&path, "one")
            .set("ssid_st", "first")
            .unwrap();

        let other = FileCredentialStore::new(&path, "two");
        assert!(matches!(
            other.get::<32>("ssid_st"),
            Err(CredentialError::NotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, "not json").unwrap();

        let mut store = FileCredentialStore::new(&path, "esp32s3");
        assert!(matches!(
            store.get::<32>("ssid_st"),
            Err(CredentialError::Unavailable(_))
        ));
        assert!(matches!(
            store.set("ssid_st", "x"),
            Err(CredentialError::Unavailable(_))
        ));
    }

    #[test]
    fn test_oversized_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileCredentialStore::new(dir.path().join("c.json"), "esp32s3");
        store.set("ssid_st", &"a".repeat(33)).unwrap();

        assert!(matches!(
            store.get::<32>("ssid_st"),
            Err(CredentialError::BufferTooSmall { capacity: 32, .. })
        ));
    }
}
