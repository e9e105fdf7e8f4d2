//! Plaintext file-backed credential store.

use crate::{CredentialStore, StorageError, StorageResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::debug;

/// JSON-file credential store.
///
/// The whole namespace is one JSON object; every mutation rewrites the file
/// through a temp-file rename, so each update is atomic at the filesystem
/// level.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by `path`. The file is created lazily on the
    /// first write.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_map(&self) -> StorageResult<Map<String, Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let value: Value = serde_json::from_str(&content).map_err(|e| {
                    StorageError::Encoding(format!("Corrupted credential file: {}", e))
                })?;
                match value {
                    Value::Object(map) => Ok(map),
                    _ => Err(StorageError::Encoding(
                        "Credential file is not a JSON object".to_string(),
                    )),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn write_map(&self, map: &Map<String, Value>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&Value::Object(map.clone()))
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ =
                tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await;
        }
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let map = self.read_map().await?;
        Ok(map.get(key).and_then(Value::as_str).map(String::from))
    }

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(path = %self.path.display(), key = %key, "Writing credential file entry");
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map).await
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut map = self.read_map().await?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(&map).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_and_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("creds.json"));

        store.set_item("auth.token", "secret-1").await.unwrap();
        assert_eq!(
            store.get_item("auth.token").await.unwrap(),
            Some("secret-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_values_persist_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("creds.json");

        let store = FileCredentialStore::new(path.clone());
        store.set_item("auth.token", "secret-1").await.unwrap();
        store.set_item("auth.sessionId", "sess-1").await.unwrap();

        let reopened = FileCredentialStore::new(path);
        assert_eq!(
            reopened.get_item("auth.token").await.unwrap(),
            Some("secret-1".to_string())
        );
        assert_eq!(
            reopened.get_item("auth.sessionId").await.unwrap(),
            Some("sess-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_missing_file_returns_none() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("never-written.json"));

        assert_eq!(store.get_item("auth.token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("creds.json"));

        store.set_item("auth.token", "old").await.unwrap();
        store.set_item("auth.token", "new").await.unwrap();
        assert_eq!(
            store.get_item("auth.token").await.unwrap(),
            Some("new".to_string())
        );
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_noop() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("creds.json"));

        // Neither the file nor the key exists yet
        store.remove_item("auth.token").await.unwrap();

        store.set_item("auth.sessionId", "sess").await.unwrap();
        store.remove_item("auth.token").await.unwrap();
        assert_eq!(
            store.get_item("auth.sessionId").await.unwrap(),
            Some("sess".to_string())
        );
    }

    #[tokio::test]
    async fn test_remove_deletes_key_only() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("creds.json"));

        store.set_item("auth.token", "secret").await.unwrap();
        store.set_item("auth.sessionId", "sess").await.unwrap();

        store.remove_item("auth.token").await.unwrap();
        assert_eq!(store.get_item("auth.token").await.unwrap(), None);
        assert_eq!(
            store.get_item("auth.sessionId").await.unwrap(),
            Some("sess".to_string())
        );
    }

    #[tokio::test]
    async fn test_corrupted_file_is_an_encoding_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, "not json {{{").unwrap();

        let store = FileCredentialStore::new(path);
        let result = store.get_item("auth.token").await;
        assert!(matches!(result, Err(StorageError::Encoding(_))));
    }

    #[tokio::test]
    async fn test_non_object_file_is_an_encoding_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = FileCredentialStore::new(path);
        let result = store.get_item("auth.token").await;
        assert!(matches!(result, Err(StorageError::Encoding(_))));
    }
}
