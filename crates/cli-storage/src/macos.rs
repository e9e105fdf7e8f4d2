//! macOS Keychain backend.

use crate::secure::KeyringBackend;
use crate::{StorageError, StorageResult};
use security_framework::item::{ItemClass, ItemSearchOptions, Limit, SearchResult};
use security_framework::passwords::{delete_generic_password, set_generic_password};
use tracing::debug;

/// Keychain-based secure storage for macOS.
pub(crate) struct KeychainBackend {
    service_name: String,
}

impl KeychainBackend {
    pub(crate) fn new(service_name: &str) -> StorageResult<Self> {
        Ok(Self {
            service_name: service_name.to_string(),
        })
    }

    fn search(&self, key: &str) -> StorageResult<Option<String>> {
        let mut search = ItemSearchOptions::new();
        search
            .class(ItemClass::generic_password())
            .service(&self.service_name)
            .account(key)
            .limit(Limit::Max(1))
            .load_data(true);

        match search.search() {
            Ok(results) => match results.into_iter().next() {
                Some(SearchResult::Data(data)) => {
                    let value = String::from_utf8(data)
                        .map_err(|e| StorageError::Encoding(e.to_string()))?;
                    Ok(Some(value))
                }
                _ => Ok(None),
            },
            Err(e) => {
                // errSecItemNotFound surfaces in several spellings
                let message = e.to_string().to_lowercase();
                if message.contains("not found")
                    || message.contains("could not be found")
                    || message.contains("-25300")
                {
                    Ok(None)
                } else {
                    Err(StorageError::Platform(format!(
                        "Keychain lookup failed: {}",
                        e
                    )))
                }
            }
        }
    }
}

impl KeyringBackend for KeychainBackend {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting keychain item");

        // Delete existing item first (ignore errors if it doesn't exist)
        let _ = delete_generic_password(&self.service_name, key);

        set_generic_password(&self.service_name, key, value.as_bytes())
            .map_err(|e| StorageError::Platform(format!("Keychain write failed: {}", e)))?;

        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        debug!(service = %self.service_name, key = %key, "Getting keychain item");
        self.search(key)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting keychain item");

        match delete_generic_password(&self.service_name, key) {
            Ok(()) => Ok(true),
            Err(e) => {
                let message = e.to_string();
                if message.contains("not found") || message.contains("-25300") {
                    Ok(false)
                } else {
                    Err(StorageError::Platform(format!(
                        "Keychain delete failed: {}",
                        e
                    )))
                }
            }
        }
    }
}
