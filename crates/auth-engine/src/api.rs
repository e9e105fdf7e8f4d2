//! Remote auth API client.

use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Authenticated user returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Result of verifying a persisted session.
#[derive(Debug, Clone)]
pub struct VerifiedSession {
    pub user: UserRecord,
    pub org_id: Option<String>,
}

/// Result of exchanging a one-time auth code.
#[derive(Debug, Clone)]
pub struct ExchangedSession {
    pub auth_token: String,
    pub user: UserRecord,
    pub org_id: Option<String>,
    pub session_id: String,
}

/// Remote operations the auth session depends on.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Verify a stored session token; returns the user it belongs to.
    async fn verify_session_token(
        &self,
        session_id: &str,
        auth_token: &str,
    ) -> AuthResult<VerifiedSession>;

    /// Exchange a one-time authorization code for a durable session.
    async fn exchange_auth_code(&self, code: &str) -> AuthResult<ExchangedSession>;
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    user: Option<UserRecord>,
    #[serde(default)]
    org_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    auth_token: Option<String>,
    #[serde(default)]
    user: Option<UserRecord>,
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

/// HTTP client for the Fillway API.
pub struct HttpAuthApi {
    api_url: String,
    http_client: reqwest::Client,
}

impl HttpAuthApi {
    /// Create a client against `api_url`.
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn verify_session_token(
        &self,
        session_id: &str,
        auth_token: &str,
    ) -> AuthResult<VerifiedSession> {
        let url = format!("{}/auth/verify-session-token", self.api_url);

        debug!(url = %url, "Verifying session token");

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", auth_token))
            .json(&VerifyRequest { session_id })
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!("Session token rejected by server");
            return Err(AuthError::TokenExpired);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Session verification failed");
            return Err(AuthError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: VerifyResponse = response.json().await?;
        let user = data.user.ok_or(AuthError::MissingUser)?;

        debug!(user_id = %user.id, "Session verified with server");

        Ok(VerifiedSession {
            user,
            org_id: data.org_id,
        })
    }

    async fn exchange_auth_code(&self, code: &str) -> AuthResult<ExchangedSession> {
        let url = format!("{}/auth/exchange-auth-code", self.api_url);

        debug!(url = %url, "Exchanging auth code");

        let response = self
            .http_client
            .post(&url)
            .json(&ExchangeRequest { code })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Auth code exchange failed");
            return Err(AuthError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ExchangeResponse = response.json().await?;

        let auth_token = data
            .auth_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let user = data.user.ok_or(AuthError::MissingUser)?;
        let session_id = data
            .session_id
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingToken)?;

        Ok(ExchangedSession {
            auth_token,
            user,
            org_id: data.org_id,
            session_id,
        })
    }
}
