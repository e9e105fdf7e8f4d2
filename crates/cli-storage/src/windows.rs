//! Windows Credential Vault backend.

use crate::secure::KeyringBackend;
use crate::{StorageError, StorageResult};
use tracing::debug;
use windows::{
    core::HSTRING,
    Security::Credentials::{PasswordCredential, PasswordVault},
};

/// Credential Vault based secure storage for Windows.
pub(crate) struct CredentialVaultBackend {
    resource_name: String,
}

impl CredentialVaultBackend {
    pub(crate) fn new(service_name: &str) -> StorageResult<Self> {
        // Verify we can access the vault
        PasswordVault::new().map_err(|e| {
            StorageError::Platform(format!("Failed to access Credential Vault: {}", e))
        })?;

        Ok(Self {
            resource_name: service_name.to_string(),
        })
    }

    fn get_vault(&self) -> StorageResult<PasswordVault> {
        PasswordVault::new().map_err(|e| {
            StorageError::Platform(format!("Failed to access Credential Vault: {}", e))
        })
    }
}

impl KeyringBackend for CredentialVaultBackend {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(resource = %self.resource_name, key = %key, "Setting credential");

        let vault = self.get_vault()?;

        // Delete existing credential first (ignore errors if it doesn't exist)
        let _ = self.delete(key);

        let credential = PasswordCredential::CreatePasswordCredential(
            &HSTRING::from(&self.resource_name),
            &HSTRING::from(key),
            &HSTRING::from(value),
        )
        .map_err(|e| StorageError::Platform(format!("Failed to create credential: {}", e)))?;

        vault
            .Add(&credential)
            .map_err(|e| StorageError::Platform(format!("Failed to add credential: {}", e)))?;

        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        debug!(resource = %self.resource_name, key = %key, "Getting credential");

        let vault = self.get_vault()?;

        match vault.Retrieve(&HSTRING::from(&self.resource_name), &HSTRING::from(key)) {
            Ok(credential) => {
                // RetrievePassword populates the Password field
                credential.RetrievePassword().map_err(|e| {
                    StorageError::Platform(format!("Failed to retrieve password: {}", e))
                })?;

                let password = credential
                    .Password()
                    .map_err(|e| StorageError::Platform(format!("Failed to get password: {}", e)))?;

                Ok(Some(password.to_string()))
            }
            Err(e) => {
                // ERROR_NOT_FOUND = 0x80070490
                if e.code().0 as u32 == 0x80070490 {
                    Ok(None)
                } else {
                    Err(StorageError::Platform(format!(
                        "Failed to retrieve credential: {}",
                        e
                    )))
                }
            }
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(resource = %self.resource_name, key = %key, "Deleting credential");

        let vault = self.get_vault()?;

        match vault.Retrieve(&HSTRING::from(&self.resource_name), &HSTRING::from(key)) {
            Ok(credential) => {
                vault.Remove(&credential).map_err(|e| {
                    StorageError::Platform(format!("Failed to remove credential: {}", e))
                })?;
                Ok(true)
            }
            Err(e) => {
                if e.code().0 as u32 == 0x80070490 {
                    Ok(false)
                } else {
                    Err(StorageError::Platform(format!(
                        "Failed to find credential for deletion: {}",
                        e
                    )))
                }
            }
        }
    }
}
