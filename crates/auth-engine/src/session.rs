//! Auth session orchestration.
//!
//! `AuthSession` drives the full browser sign-in handshake: CSRF token
//! generation, callback server lifecycle, code exchange and credential
//! persistence. An internal FSM tracks transient states (signing in,
//! validating) explicitly instead of deriving them from storage checks.

use crate::api::{AuthApi, UserRecord};
use crate::auth_fsm::{AuthState, SessionMachine, SessionMachineInput, SessionMachineState};
use crate::callback::CallbackServer;
use crate::error::{report_auth_error, AuthError, AuthResult};
use crate::port::{find_available_port, DEFAULT_CALLBACK_PORT};
use cli_storage::{CredentialStore, StorageKeys};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use telemetry::TelemetrySink;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default bound on waiting for the browser callback.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Tunables for the sign-in flow.
#[derive(Clone)]
pub struct SessionOptions {
    /// Base URL of the web application. Hosts the authorization page and
    /// supplies the CORS origin for the callback server.
    pub web_app_url: String,
    /// First port probed for the callback server.
    pub start_port: u16,
    /// Bound on waiting for the browser callback; `None` waits forever.
    pub callback_timeout: Option<Duration>,
    /// Open the system browser at the authorization URL.
    pub open_browser: bool,
    /// Copy the authorization URL to the system clipboard.
    pub copy_to_clipboard: bool,
}

impl SessionOptions {
    pub fn new(web_app_url: impl Into<String>) -> Self {
        Self {
            web_app_url: web_app_url.into(),
            start_port: DEFAULT_CALLBACK_PORT,
            callback_timeout: Some(DEFAULT_CALLBACK_TIMEOUT),
            open_browser: true,
            copy_to_clipboard: true,
        }
    }
}

/// Point-in-time view of the session for status reporting.
/// The session token is deliberately absent.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: AuthState,
    pub is_signed_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    pub session_id: String,
}

type AuthUrlListener = Box<dyn Fn(&str) + Send + Sync>;

/// The CLI's authentication state and the operations that mutate it.
///
/// All operations take `&mut self`, so no two can interleave; the callback
/// server only ever exists inside a `sign_in` call.
pub struct AuthSession {
    fsm: SessionMachine,
    user: Option<UserRecord>,
    org_id: Option<String>,
    auth_token: Option<String>,
    session_id: String,
    auth_url: Option<String>,
    csrf_token: Option<String>,
    token_store: Arc<dyn CredentialStore>,
    session_store: Arc<dyn CredentialStore>,
    api: Arc<dyn AuthApi>,
    telemetry: Arc<dyn TelemetrySink>,
    options: SessionOptions,
    auth_url_listener: Option<AuthUrlListener>,
}

impl AuthSession {
    /// Create a session over injected collaborators. Nothing is read from
    /// storage until `validate_session` runs.
    pub fn new(
        token_store: Arc<dyn CredentialStore>,
        session_store: Arc<dyn CredentialStore>,
        api: Arc<dyn AuthApi>,
        telemetry: Arc<dyn TelemetrySink>,
        options: SessionOptions,
    ) -> Self {
        Self {
            fsm: SessionMachine::new(),
            user: None,
            org_id: None,
            auth_token: None,
            session_id: Uuid::new_v4().to_string(),
            auth_url: None,
            csrf_token: None,
            token_store,
            session_store,
            api,
            telemetry,
            options,
            auth_url_listener: None,
        }
    }

    /// Register a hook invoked with the authorization URL once the callback
    /// server is listening. The CLI uses this to print the URL.
    pub fn on_auth_url(&mut self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.auth_url_listener = Some(Box::new(listener));
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.fsm.state())
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self.fsm.state(), SessionMachineState::SignedIn)
    }

    pub fn is_signing_in(&self) -> bool {
        matches!(self.fsm.state(), SessionMachineState::SigningIn)
    }

    pub fn is_validating_session(&self) -> bool {
        matches!(self.fsm.state(), SessionMachineState::Validating)
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    pub fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current session token. Secret: callers must not log it.
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Authorization URL, present only while a sign-in waits on the browser.
    pub fn auth_url(&self) -> Option<&str> {
        self.auth_url.as_deref()
    }

    /// Expected CSRF token, present only during an in-flight flow.
    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            is_signed_in: self.is_signed_in(),
            user: self.user.clone(),
            org_id: self.org_id.clone(),
            session_id: self.session_id.clone(),
        }
    }

    /// Shared token store instance.
    pub fn token_store(&self) -> &Arc<dyn CredentialStore> {
        &self.token_store
    }

    /// Shared session-id store instance.
    pub fn session_store(&self) -> &Arc<dyn CredentialStore> {
        &self.session_store
    }

    fn transition(&mut self, input: &SessionMachineInput) -> AuthResult<()> {
        let old_state = AuthState::from(self.fsm.state());
        self.fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                self.fsm.state()
            ))
        })?;

        let new_state = AuthState::from(self.fsm.state());
        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "Auth state transition");
        }
        Ok(())
    }

    /// Validate the persisted session against the remote API.
    ///
    /// Failures never propagate past this boundary: a missing credential,
    /// storage failure or rejected verification degrades to `false` after
    /// clearing state via `logout`.
    pub async fn validate_session(&mut self) -> bool {
        if self
            .transition(&SessionMachineInput::ValidateSession)
            .is_err()
        {
            debug!("Ignoring validate_session during an in-flight sign-in");
            return false;
        }

        match self.try_validate().await {
            Ok(true) => true,
            Ok(false) => {
                info!("No persisted session found");
                self.logout().await;
                false
            }
            Err(e) => {
                warn!(error = %e, "Session validation failed");
                self.logout().await;
                false
            }
        }
    }

    async fn try_validate(&mut self) -> AuthResult<bool> {
        let session_id = self.session_store.get_item(StorageKeys::SESSION_ID).await?;
        let auth_token = self.token_store.get_item(StorageKeys::AUTH_TOKEN).await?;

        let (Some(session_id), Some(auth_token)) = (session_id, auth_token) else {
            return Ok(false);
        };

        let verified = self
            .api
            .verify_session_token(&session_id, &auth_token)
            .await?;

        self.transition(&SessionMachineInput::SessionValid)?;
        let user_id = verified.user.id.clone();
        self.user = Some(verified.user);
        self.org_id = verified.org_id;
        self.auth_token = Some(auth_token);
        self.session_id = session_id;

        info!(user_id = %user_id, "Session validated");
        Ok(true)
    }

    /// Run the full browser sign-in handshake.
    ///
    /// No-op when a sign-in is already in flight or a session is active.
    /// The callback server's lifetime is strictly scoped to this call: it
    /// is stopped on every exit path.
    pub async fn sign_in(&mut self) -> AuthResult<()> {
        if self.is_signing_in() || self.is_signed_in() {
            info!("Sign-in requested while already signing in or signed in, ignoring");
            return Ok(());
        }

        self.reset();
        self.transition(&SessionMachineInput::SignInAttempt)?;

        // The CSRF token is minted before the URL and the server; both
        // carry the same value.
        let csrf_token = Uuid::new_v4().to_string();

        let mut server = match self.start_callback_server(&csrf_token).await {
            Ok(server) => server,
            Err(e) => {
                let _ = self.transition(&SessionMachineInput::SignInFailed);
                return Err(report_auth_error(self.telemetry.as_ref(), e));
            }
        };
        self.csrf_token = Some(csrf_token);

        let outcome = self.complete_sign_in(&mut server).await;

        server.stop().await;
        self.csrf_token = None;
        self.auth_url = None;

        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = self.transition(&SessionMachineInput::SignInFailed);
                Err(e)
            }
        }
    }

    async fn start_callback_server(&mut self, csrf_token: &str) -> AuthResult<CallbackServer> {
        let port = find_available_port(self.options.start_port).await?;
        let auth_url = format!(
            "{}/cli-token?port={}&csrf={}",
            self.options.web_app_url.trim_end_matches('/'),
            port,
            csrf_token
        );

        let mut server = CallbackServer::new(csrf_token, port, &self.options.web_app_url)?;
        // The browser must not open before the listener is bound; a fast
        // click would hit connection-refused.
        server.start().await?;

        self.auth_url = Some(auth_url.clone());
        if let Some(listener) = &self.auth_url_listener {
            listener(&auth_url);
        }

        if self.options.copy_to_clipboard {
            match arboard::Clipboard::new() {
                Ok(mut clipboard) => {
                    if let Err(e) = clipboard.set_text(auth_url.clone()) {
                        warn!(error = %e, "Failed to copy authorization URL to clipboard");
                    }
                }
                Err(e) => warn!(error = %e, "Clipboard unavailable"),
            }
        }

        if self.options.open_browser {
            if let Err(e) = open::that(&auth_url) {
                warn!(error = %e, "Failed to open browser, use the printed URL");
            }
        }

        Ok(server)
    }

    async fn complete_sign_in(&mut self, server: &mut CallbackServer) -> AuthResult<()> {
        let code = match server.wait_for_code(self.options.callback_timeout).await {
            Ok(code) => code,
            Err(e) => return Err(report_auth_error(self.telemetry.as_ref(), e)),
        };

        debug!("Received authorization code from callback");
        self.exchange_auth_code(&code).await
    }

    /// Exchange a one-time authorization code for a durable session.
    ///
    /// The token and session id hit the stores before any in-memory field
    /// changes, so a crash between the two leaves recoverable disk state
    /// rather than a signed-in session with nothing persisted. Every
    /// failure is reported and re-thrown; this method cannot swallow errors.
    pub async fn exchange_auth_code(&mut self, code: &str) -> AuthResult<()> {
        match self.try_exchange(code).await {
            Ok(()) => Ok(()),
            Err(e) => Err(report_auth_error(self.telemetry.as_ref(), e)),
        }
    }

    async fn try_exchange(&mut self, code: &str) -> AuthResult<()> {
        let exchanged = self.api.exchange_auth_code(code).await?;

        self.token_store
            .set_item(StorageKeys::AUTH_TOKEN, &exchanged.auth_token)
            .await?;
        self.session_store
            .set_item(StorageKeys::SESSION_ID, &exchanged.session_id)
            .await?;

        // Direct calls land here from SignedOut; sign_in arrives already
        // in SigningIn.
        let _ = self.transition(&SessionMachineInput::SignInAttempt);
        self.transition(&SessionMachineInput::SignInSuccess)?;

        let user_id = exchanged.user.id.clone();
        self.user = Some(exchanged.user);
        self.org_id = exchanged.org_id;
        self.auth_token = Some(exchanged.auth_token);
        self.session_id = exchanged.session_id;

        info!(user_id = %user_id, "Signed in");
        self.telemetry
            .capture_event("auth.signed_in", json!({ "user_id": user_id }));
        Ok(())
    }

    /// Clear the session, removing persisted credentials.
    ///
    /// Storage failures are logged, never propagated; in-memory state is
    /// reset unconditionally. A second logout in a row is a plain reset and
    /// emits no telemetry.
    pub async fn logout(&mut self) {
        let signed_out = matches!(self.fsm.state(), SessionMachineState::SignedOut);
        if signed_out && self.user.is_none() {
            self.reset();
            return;
        }

        let _ = self.transition(&SessionMachineInput::SignOut);

        if let Err(e) = self
            .token_store
            .remove_item(StorageKeys::AUTH_TOKEN)
            .await
        {
            warn!(error = %e, "Failed to remove stored auth token");
        }
        if let Err(e) = self
            .session_store
            .remove_item(StorageKeys::SESSION_ID)
            .await
        {
            warn!(error = %e, "Failed to remove stored session id");
        }

        info!("Signed out");
        self.telemetry.capture_event("auth.signed_out", json!({}));
        self.reset();
    }

    /// Restore defaults: fresh FSM, cleared user/token/flow fields, and a
    /// new session id. The store, API and telemetry instances are
    /// long-lived collaborators and survive.
    pub fn reset(&mut self) {
        self.fsm = SessionMachine::new();
        self.user = None;
        self.org_id = None;
        self.auth_token = None;
        self.auth_url = None;
        self.csrf_token = None;
        self.session_id = Uuid::new_v4().to_string();
    }
}
