//! Process-wide collaborators, built once at startup and injected.

use anyhow::{Context as _, Result};
use auth_engine::{AuthApi, AuthSession, HttpAuthApi, SessionOptions};
use cli_config_and_utils::{Config, Paths};
use cli_storage::{create_session_store, create_token_store, CredentialStore};
use std::sync::Arc;
use std::time::Duration;
use telemetry::{LogSink, TelemetrySink};
use tracing::debug;

/// Everything the commands need, wired exactly once in `main`.
pub struct AppContext {
    pub config: Config,
    pub paths: Paths,
    token_store: Arc<dyn CredentialStore>,
    session_store: Arc<dyn CredentialStore>,
    api: Arc<dyn AuthApi>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl AppContext {
    /// Load configuration and construct the shared collaborators.
    pub fn bootstrap() -> Result<Self> {
        let paths = Paths::new().context("Failed to resolve application paths")?;
        let config = Config::load(&paths).context("Failed to load configuration")?;

        debug!(
            base_dir = %paths.base_dir().display(),
            credential_store = ?config.credential_store,
            "Configuration loaded"
        );

        let token_store = create_token_store(config.credential_store, &paths)
            .context("Failed to open credential store")?;
        let session_store = create_session_store(&paths);
        let api: Arc<dyn AuthApi> = Arc::new(HttpAuthApi::new(&config.api_url));
        let telemetry: Arc<dyn TelemetrySink> = Arc::new(LogSink);

        Ok(Self {
            config,
            paths,
            token_store,
            session_store,
            api,
            telemetry,
        })
    }

    /// Build an auth session over this context's collaborators.
    pub fn auth_session(&self) -> AuthSession {
        let mut options = SessionOptions::new(self.config.web_app_url.clone());
        options.callback_timeout = match self.config.callback_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        AuthSession::new(
            self.token_store.clone(),
            self.session_store.clone(),
            self.api.clone(),
            self.telemetry.clone(),
            options,
        )
    }
}
