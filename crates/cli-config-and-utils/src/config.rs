//! Configuration management for the CLI.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default web application URL (can be overridden at compile time via
/// FILLWAY_WEB_APP_URL env var). Also the CORS origin for the auth callback.
pub const DEFAULT_WEB_APP_URL: &str = match option_env!("FILLWAY_WEB_APP_URL") {
    Some(url) => url,
    None => "https://fillway.app",
};

/// Default API base URL (can be overridden at compile time via
/// FILLWAY_API_URL env var).
pub const DEFAULT_API_URL: &str = match option_env!("FILLWAY_API_URL") {
    Some(url) => url,
    None => "https://api.fillway.app",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default bound on the browser-callback wait, in seconds. Zero disables
/// the bound.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Which backend holds the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStoreKind {
    /// OS secure store (Keychain / Secret Service / Credential Vault).
    #[default]
    Secure,
    /// Plaintext JSON file under the app directory. Development only.
    File,
}

/// Main CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Web application base URL.
    #[serde(default = "default_web_app_url")]
    pub web_app_url: String,
    /// API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Backend for the session token.
    #[serde(default)]
    pub credential_store: CredentialStoreKind,
    /// Browser-callback wait bound in seconds; 0 waits forever.
    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,
}

fn default_web_app_url() -> String {
    DEFAULT_WEB_APP_URL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_callback_timeout_secs() -> u64 {
    DEFAULT_CALLBACK_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            web_app_url: DEFAULT_WEB_APP_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            credential_store: CredentialStoreKind::default(),
            callback_timeout_secs: DEFAULT_CALLBACK_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from a file, falling back to defaults.
    /// Note: web_app_url and api_url are compile-time only and will always
    /// use the built-in defaults, regardless of what's in the config file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        // Force compile-time values (never from config file)
        config.web_app_url = DEFAULT_WEB_APP_URL.to_string();
        config.api_url = DEFAULT_API_URL.to_string();

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    /// The URLs are compile-time only; log level and credential store
    /// backend can be overridden at runtime.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("FILLWAY_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(kind) = std::env::var("FILLWAY_CREDENTIAL_STORE") {
            match kind.to_ascii_lowercase().as_str() {
                "secure" => self.credential_store = CredentialStoreKind::Secure,
                "file" => self.credential_store = CredentialStoreKind::File,
                other => tracing::warn!(
                    value = %other,
                    "Unknown FILLWAY_CREDENTIAL_STORE value, keeping configured backend"
                ),
            }
        }
    }

    /// Get the web application URL as a parsed URL.
    pub fn web_app_url(&self) -> CoreResult<Url> {
        Url::parse(&self.web_app_url).map_err(CoreError::from)
    }

    /// Get the API URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_url).map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.web_app_url, DEFAULT_WEB_APP_URL);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.credential_store, CredentialStoreKind::Secure);
        assert_eq!(config.callback_timeout_secs, DEFAULT_CALLBACK_TIMEOUT_SECS);
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "credential_store": "file"
        }"#;

        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.credential_store, CredentialStoreKind::File);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        // Note: web_app_url and api_url are compile-time only and will be
        // forced to defaults on load
        let mut config = Config::default();
        config.log_level = "trace".to_string();
        config.credential_store = CredentialStoreKind::File;

        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.log_level, "trace");
        assert_eq!(loaded.credential_store, CredentialStoreKind::File);
        assert_eq!(loaded.web_app_url, DEFAULT_WEB_APP_URL);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.web_app_url, DEFAULT_WEB_APP_URL);
    }

    #[test]
    fn test_config_web_app_url_parse() {
        let config = Config::default();
        let url = config.web_app_url().unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_config_invalid_url() {
        let mut config = Config::default();
        config.web_app_url = "not a valid url".to_string();

        assert!(config.web_app_url().is_err());
    }

    #[test]
    fn test_credential_store_kind_serde() {
        let json = serde_json::to_string(&CredentialStoreKind::Secure).unwrap();
        assert_eq!(json, "\"secure\"");
        let parsed: CredentialStoreKind = serde_json::from_str("\"file\"").unwrap();
        assert_eq!(parsed, CredentialStoreKind::File);
    }

    #[test]
    fn test_default_constants() {
        assert!(!DEFAULT_LOG_LEVEL.is_empty());
        assert!(DEFAULT_WEB_APP_URL.starts_with("https://"));
        assert!(DEFAULT_API_URL.starts_with("https://"));
    }
}
