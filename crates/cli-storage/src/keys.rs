//! Storage key constants.

/// Storage keys used by the CLI.
pub struct StorageKeys;

impl StorageKeys {
    /// Session token issued by the auth-code exchange (secret).
    pub const AUTH_TOKEN: &'static str = "auth.token";

    /// Remote session id (non-secret).
    pub const SESSION_ID: &'static str = "auth.sessionId";
}
