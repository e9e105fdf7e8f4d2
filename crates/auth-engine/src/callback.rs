//! Local HTTP callback server for browser-based authentication.
//!
//! The remote auth page redirects the user's browser to
//! `http://localhost:<port>/?code=..&csrf=..` after login. This server
//! receives that single request, validates it against the expected CSRF
//! token, and delivers the authorization code to the waiting sign-in flow.

use crate::error::{AuthError, AuthResult, CallbackFailure};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

/// Outcome of one callback request, delivered at most once.
type CallbackOutcome = Result<String, CallbackFailure>;
type OutcomeSender = Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>;

/// Short-lived HTTP server hosting the sign-in callback endpoint.
///
/// One request may be pending at a time: `start` fails fast while a
/// previous one is outstanding, so callers must serialize sign-in attempts
/// and `stop` between them.
pub struct CallbackServer {
    csrf_token: String,
    port: u16,
    web_origin: String,
    success_url: String,
    accept_task: Option<JoinHandle<()>>,
    pending: Option<oneshot::Receiver<CallbackOutcome>>,
}

impl CallbackServer {
    /// Create a server expecting `csrf_token` on `port`. The web app URL
    /// supplies the CORS origin and the post-login redirect target.
    pub fn new(csrf_token: impl Into<String>, port: u16, web_app_url: &str) -> AuthResult<Self> {
        let parsed = Url::parse(web_app_url)?;
        let web_origin = parsed.origin().ascii_serialization();
        let success_url = format!("{}/cli-token/success", web_app_url.trim_end_matches('/'));

        Ok(Self {
            csrf_token: csrf_token.into(),
            port,
            web_origin,
            success_url,
            accept_task: None,
            pending: None,
        })
    }

    /// Port this server listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind the listener and start accepting callback requests.
    ///
    /// Returns only once the port is bound, so the caller may open the
    /// browser immediately afterwards. Fails with
    /// [`AuthError::AuthenticationInProgress`] while a previous request is
    /// still pending or the listener is still up.
    pub async fn start(&mut self) -> AuthResult<()> {
        if self.pending.is_some() || self.accept_task.is_some() {
            return Err(AuthError::AuthenticationInProgress);
        }

        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            AuthError::InvalidAuthResponse(CallbackFailure::ServerError {
                reason: format!("Failed to bind to {}: {}", addr, e),
            })
        })?;

        info!(port = self.port, "Auth callback server listening");

        let (tx, rx) = oneshot::channel::<CallbackOutcome>();
        let tx: OutcomeSender = Arc::new(Mutex::new(Some(tx)));

        let csrf_token = self.csrf_token.clone();
        let web_origin = self.web_origin.clone();
        let success_url = self.success_url.clone();

        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut socket, _)) => {
                        let tx = tx.clone();
                        let csrf_token = csrf_token.clone();
                        let web_origin = web_origin.clone();
                        let success_url = success_url.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(
                                &mut socket,
                                &tx,
                                &csrf_token,
                                &web_origin,
                                &success_url,
                            )
                            .await
                            {
                                error!("Error handling callback connection: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error on callback server: {}", e);
                        reject(
                            &tx,
                            CallbackFailure::ServerError {
                                reason: e.to_string(),
                            },
                        )
                        .await;
                        break;
                    }
                }
            }
        });

        self.accept_task = Some(task);
        self.pending = Some(rx);
        Ok(())
    }

    /// Await the authorization code from the pending callback request.
    ///
    /// `timeout` bounds the wait and maps to [`AuthError::Timeout`];
    /// `None` waits until a request arrives.
    pub async fn wait_for_code(&mut self, timeout: Option<Duration>) -> AuthResult<String> {
        let rx = self.pending.take().ok_or_else(|| {
            AuthError::InvalidAuthResponse(CallbackFailure::ServerError {
                reason: "No pending callback request".to_string(),
            })
        })?;

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => return Err(AuthError::Timeout),
            },
            None => rx.await,
        };

        match outcome {
            Ok(Ok(code)) => Ok(code),
            Ok(Err(failure)) => Err(AuthError::InvalidAuthResponse(failure)),
            Err(_) => Err(AuthError::InvalidAuthResponse(CallbackFailure::ServerError {
                reason: "Callback channel closed".to_string(),
            })),
        }
    }

    /// Stop listening and clear any pending request without delivering it.
    /// Safe to call repeatedly.
    pub async fn stop(&mut self) {
        self.pending = None;
        if let Some(task) = self.accept_task.take() {
            task.abort();
            let _ = task.await;
            debug!(port = self.port, "Auth callback server stopped");
        }
    }
}

async fn reject(tx: &OutcomeSender, failure: CallbackFailure) {
    if let Some(sender) = tx.lock().await.take() {
        let _ = sender.send(Err(failure));
    }
}

async fn resolve(tx: &OutcomeSender, code: String) {
    if let Some(sender) = tx.lock().await.take() {
        let _ = sender.send(Ok(code));
    }
}

/// Handle an incoming HTTP connection.
async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    tx: &OutcomeSender,
    expected_csrf: &str,
    web_origin: &str,
    success_url: &str,
) -> AuthResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "Received callback request");

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next();

    // Preflight carries no auth parameters; answer it and keep waiting.
    if method.eq_ignore_ascii_case("OPTIONS") {
        send_preflight(&mut writer, web_origin).await?;
        return Ok(());
    }

    let Some(target) = target else {
        send_response(&mut writer, 400, "Bad Request", web_origin, "Invalid request").await?;
        reject(tx, CallbackFailure::MissingUrl).await;
        return Ok(());
    };

    let params = parse_query(target);
    let csrf = params.get("csrf");
    let code = params.get("code");

    // An error from the remote auth page wins over any other parameter.
    if let Some(error) = params.get("error") {
        send_response(&mut writer, 400, "Bad Request", web_origin, "Authentication failed")
            .await?;
        reject(
            tx,
            CallbackFailure::Remote {
                error: error.clone(),
            },
        )
        .await;
        return Ok(());
    }

    let csrf_token_matches = csrf.map(|value| value == expected_csrf).unwrap_or(false);
    if csrf.is_none() || code.is_none() || !csrf_token_matches {
        send_response(&mut writer, 400, "Bad Request", web_origin, "Invalid request").await?;
        reject(
            tx,
            CallbackFailure::Validation {
                has_csrf_token: csrf.is_some(),
                has_code: code.is_some(),
                csrf_token_matches,
            },
        )
        .await;
        return Ok(());
    }

    send_redirect(&mut writer, web_origin, success_url).await?;
    if let Some(code) = code {
        resolve(tx, code.clone()).await;
    }
    Ok(())
}

/// Parse query parameters from the request target. Path is irrelevant.
fn parse_query(target: &str) -> HashMap<String, String> {
    let url = match Url::parse(&format!("http://localhost{}", target)) {
        Ok(url) => url,
        Err(_) => return HashMap::new(),
    };

    url.query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

async fn send_preflight(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    web_origin: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 204 No Content\r\n\
         Access-Control-Allow-Origin: {}\r\n\
         Access-Control-Allow-Methods: GET, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Connection: close\r\n\r\n",
        web_origin
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

async fn send_redirect(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    web_origin: &str,
    location: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 302 Found\r\n\
         Access-Control-Allow-Origin: {}\r\n\
         Location: {}\r\n\
         Content-Length: 0\r\n\
         Connection: close\r\n\r\n",
        web_origin, location
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Send a plaintext HTTP response with the CORS header attached.
async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    web_origin: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\n\
         Access-Control-Allow-Origin: {}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        status_code,
        status_text,
        web_origin,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::find_available_port;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    const WEB_APP_URL: &str = "https://fillway.test";

    // Each test probes its own region of the port space so parallel test
    // runs do not race for the same ports.
    async fn started_server(csrf_token: &str, base_port: u16) -> CallbackServer {
        let port = find_available_port(base_port).await.unwrap();
        let mut server = CallbackServer::new(csrf_token, port, WEB_APP_URL).unwrap();
        server.start().await.unwrap();
        server
    }

    async fn send_request(port: u16, request: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_valid_callback_resolves_code() {
        let mut server = started_server("XYZ", 40010).await;

        let response = send_request(
            server.port(),
            "GET /?code=abc123&csrf=XYZ HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;

        assert!(response.starts_with("HTTP/1.1 302"));
        assert!(response.contains("Location: https://fillway.test/cli-token/success"));
        assert!(response.contains("Access-Control-Allow-Origin: https://fillway.test"));

        let code = server.wait_for_code(Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(code, "abc123");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_mismatched_csrf_rejects_with_flags() {
        let mut server = started_server("XYZ", 40020).await;

        let response = send_request(
            server.port(),
            "GET /?code=abc123&csrf=WRONG HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 400"));

        let result = server.wait_for_code(Some(Duration::from_secs(1))).await;
        match result {
            Err(AuthError::InvalidAuthResponse(CallbackFailure::Validation {
                has_csrf_token,
                has_code,
                csrf_token_matches,
            })) => {
                assert!(has_csrf_token);
                assert!(has_code);
                assert!(!csrf_token_matches);
            }
            other => panic!("Expected validation failure, got {:?}", other.map(|_| ())),
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn test_missing_csrf_rejects_with_flags() {
        let mut server = started_server("XYZ", 40030).await;

        send_request(
            server.port(),
            "GET /?code=abc123 HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;

        let result = server.wait_for_code(Some(Duration::from_secs(1))).await;
        match result {
            Err(AuthError::InvalidAuthResponse(CallbackFailure::Validation {
                has_csrf_token,
                has_code,
                csrf_token_matches,
            })) => {
                assert!(!has_csrf_token);
                assert!(has_code);
                assert!(!csrf_token_matches);
            }
            other => panic!("Expected validation failure, got {:?}", other.map(|_| ())),
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn test_error_param_wins_over_valid_credentials() {
        let mut server = started_server("XYZ", 40040).await;

        let response = send_request(
            server.port(),
            "GET /?error=access_denied&code=abc123&csrf=XYZ HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 400"));

        let result = server.wait_for_code(Some(Duration::from_secs(1))).await;
        match result {
            Err(AuthError::InvalidAuthResponse(CallbackFailure::Remote { error })) => {
                assert_eq!(error, "access_denied");
            }
            other => panic!("Expected remote failure, got {:?}", other.map(|_| ())),
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn test_options_preflight_does_not_touch_pending_request() {
        let mut server = started_server("XYZ", 40050).await;

        let preflight = send_request(
            server.port(),
            "OPTIONS / HTTP/1.1\r\nHost: localhost\r\nOrigin: https://fillway.test\r\n\r\n",
        )
        .await;
        assert!(preflight.starts_with("HTTP/1.1 204"));
        assert!(preflight.contains("Access-Control-Allow-Origin: https://fillway.test"));
        assert!(preflight.contains("Access-Control-Allow-Methods: GET, OPTIONS"));
        assert!(preflight.contains("Access-Control-Allow-Headers: Content-Type"));

        // The real callback still resolves afterwards
        send_request(
            server.port(),
            "GET /?code=later&csrf=XYZ HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;
        let code = server.wait_for_code(Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(code, "later");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_path_is_irrelevant() {
        let mut server = started_server("XYZ", 40060).await;

        send_request(
            server.port(),
            "GET /anything/here?code=abc&csrf=XYZ HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;

        let code = server.wait_for_code(Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(code, "abc");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_start_while_pending_is_a_conflict() {
        let mut server = started_server("XYZ", 40070).await;

        let result = server.start().await;
        assert!(matches!(result, Err(AuthError::AuthenticationInProgress)));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_wait_for_code_times_out() {
        let mut server = started_server("XYZ", 40080).await;

        let result = server.wait_for_code(Some(Duration::from_millis(50))).await;
        assert!(matches!(result, Err(AuthError::Timeout)));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_stop_releases_port_and_is_idempotent() {
        let mut server = started_server("XYZ", 40090).await;
        let port = server.port();

        server.stop().await;
        server.stop().await;

        let probe = tokio::net::TcpListener::bind(("127.0.0.1", port)).await;
        assert!(probe.is_ok());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let mut server = started_server("XYZ", 40100).await;
        server.stop().await;

        server.start().await.unwrap();
        send_request(
            server.port(),
            "GET /?code=second&csrf=XYZ HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;
        let code = server.wait_for_code(Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(code, "second");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_is_a_server_error() {
        let port = find_available_port(40110).await.unwrap();
        let _occupant = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();

        let mut server = CallbackServer::new("XYZ", port, WEB_APP_URL).unwrap();
        let result = server.start().await;
        assert!(matches!(
            result,
            Err(AuthError::InvalidAuthResponse(CallbackFailure::ServerError { .. }))
        ));
    }

    #[test]
    fn test_parse_query_decodes_pairs() {
        let params = parse_query("/?code=abc%20def&csrf=XYZ");
        assert_eq!(params["code"], "abc def");
        assert_eq!(params["csrf"], "XYZ");
    }

    #[test]
    fn test_parse_query_without_query_is_empty() {
        assert!(parse_query("/").is_empty());
    }
}
