//! Storage trait definitions.

use crate::StorageResult;
use async_trait::async_trait;

/// Capability interface for durable key/value credential storage.
///
/// The auth session is agnostic to which backend is active; both the file
/// store and the platform secure store implement this identical contract.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Retrieve a value, or `None` if the key has never been stored.
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store a value, replacing any previous one.
    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value. Removing a missing key is a no-op, not an error.
    async fn remove_item(&self, key: &str) -> StorageResult<()>;
}
