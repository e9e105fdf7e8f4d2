//! OS secure-store backed credential store.

use crate::{CredentialStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Blocking keychain operations, implemented per platform.
pub(crate) trait KeyringBackend: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;
}

/// Credential store backed by the platform secure store.
///
/// The platform APIs are blocking, so every operation runs on the blocking
/// thread pool.
pub struct SecureCredentialStore {
    backend: Arc<dyn KeyringBackend>,
}

impl SecureCredentialStore {
    pub(crate) fn new(backend: Arc<dyn KeyringBackend>) -> Self {
        Self { backend }
    }

    /// Create a store over the default secure backend for this platform.
    pub fn with_default_backend(service_name: &str) -> StorageResult<Self> {
        #[cfg(target_os = "macos")]
        {
            let backend = crate::macos::KeychainBackend::new(service_name)?;
            Ok(Self::new(Arc::new(backend)))
        }

        #[cfg(target_os = "linux")]
        {
            let backend = crate::linux::SecretServiceBackend::new(service_name)?;
            Ok(Self::new(Arc::new(backend)))
        }

        #[cfg(target_os = "windows")]
        {
            let backend = crate::windows::CredentialVaultBackend::new(service_name)?;
            Ok(Self::new(Arc::new(backend)))
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            let _ = service_name;
            Err(StorageError::Platform(
                "No secure storage implementation available for this platform".to_string(),
            ))
        }
    }
}

#[async_trait]
impl CredentialStore for SecureCredentialStore {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let backend = self.backend.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.get(&key))
            .await
            .map_err(|e| StorageError::Platform(format!("Keychain task failed: {}", e)))?
    }

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let backend = self.backend.clone();
        let key = key.to_string();
        let value = value.to_string();
        tokio::task::spawn_blocking(move || backend.set(&key, &value))
            .await
            .map_err(|e| StorageError::Platform(format!("Keychain task failed: {}", e)))?
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        let backend = self.backend.clone();
        let key = key.to_string();
        // A missing key deletes to `false`, which is still a successful removal
        tokio::task::spawn_blocking(move || backend.delete(&key).map(|_| ()))
            .await
            .map_err(|e| StorageError::Platform(format!("Keychain task failed: {}", e)))?
    }
}
