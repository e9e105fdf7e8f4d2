//! Credential persistence for the Fillway CLI.
//!
//! Two stores implement the same [`CredentialStore`] contract:
//! - **File**: plaintext JSON under the app directory (development, and
//!   always for the non-secret session id)
//! - **Secure**: the platform secret store — macOS Keychain via
//!   `security-framework`, Linux Secret Service (GNOME Keyring / KWallet)
//!   via `secret-service`, Windows Credential Vault via the `windows` crate

mod file;
mod keys;
mod secure;
mod traits;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows;

pub use file::FileCredentialStore;
pub use keys::StorageKeys;
pub use secure::SecureCredentialStore;
pub use traits::CredentialStore;

use cli_config_and_utils::{CredentialStoreKind, Paths};
use std::sync::Arc;
use thiserror::Error;

/// Service name used for all secure storage operations.
pub const SERVICE_NAME: &str = "app.fillway.cli";

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the token store selected by configuration.
pub fn create_token_store(
    kind: CredentialStoreKind,
    paths: &Paths,
) -> StorageResult<Arc<dyn CredentialStore>> {
    match kind {
        CredentialStoreKind::File => {
            Ok(Arc::new(FileCredentialStore::new(paths.credentials_file())))
        }
        CredentialStoreKind::Secure => Ok(Arc::new(SecureCredentialStore::with_default_backend(
            SERVICE_NAME,
        )?)),
    }
}

/// Create the session-id store. Session ids are not secret and always live
/// in the file store.
pub fn create_session_store(paths: &Paths) -> Arc<dyn CredentialStore> {
    Arc::new(FileCredentialStore::new(paths.session_file()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store for testing
    struct MemoryStore {
        data: Mutex<HashMap<String, String>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                data: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove_item(&self, key: &str) -> StorageResult<()> {
            self.data.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_memory_store_contract() {
        let store = MemoryStore::new();

        assert_eq!(store.get_item("missing").await.unwrap(), None);

        store.set_item(StorageKeys::AUTH_TOKEN, "tok-1").await.unwrap();
        assert_eq!(
            store.get_item(StorageKeys::AUTH_TOKEN).await.unwrap(),
            Some("tok-1".to_string())
        );

        store.set_item(StorageKeys::AUTH_TOKEN, "tok-2").await.unwrap();
        assert_eq!(
            store.get_item(StorageKeys::AUTH_TOKEN).await.unwrap(),
            Some("tok-2".to_string())
        );

        store.remove_item(StorageKeys::AUTH_TOKEN).await.unwrap();
        assert_eq!(store.get_item(StorageKeys::AUTH_TOKEN).await.unwrap(), None);

        // Removing a missing key is a no-op
        store.remove_item(StorageKeys::AUTH_TOKEN).await.unwrap();
    }

    #[test]
    fn test_storage_keys_constants() {
        assert!(!StorageKeys::AUTH_TOKEN.is_empty());
        assert!(!StorageKeys::SESSION_ID.is_empty());
        assert_ne!(StorageKeys::AUTH_TOKEN, StorageKeys::SESSION_ID);
    }

    #[tokio::test]
    async fn test_create_session_store_is_file_backed() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let store = create_session_store(&paths);
        store.set_item(StorageKeys::SESSION_ID, "sess-1").await.unwrap();

        assert!(paths.session_file().exists());
        assert_eq!(
            store.get_item(StorageKeys::SESSION_ID).await.unwrap(),
            Some("sess-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_token_store_file_kind() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let store = create_token_store(CredentialStoreKind::File, &paths).unwrap();
        store.set_item(StorageKeys::AUTH_TOKEN, "tok").await.unwrap();

        assert!(paths.credentials_file().exists());
    }
}
