//! Free-port probing for the local callback server.

use crate::{AuthError, AuthResult};
use tokio::net::TcpListener;
use tracing::debug;

/// Default port the callback server starts probing from.
pub const DEFAULT_CALLBACK_PORT: u16 = 54321;

/// Find a free local TCP port, probing sequentially from `start_port`.
///
/// A port counts as available once a throwaway listener binds to it; the
/// listener is closed immediately and the port number returned. Probing is
/// strictly sequential and stops at the first success. This is a one-time
/// setup step, not a hot path.
pub async fn find_available_port(start_port: u16) -> AuthResult<u16> {
    for port in start_port..=u16::MAX {
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                drop(listener);
                debug!(port, "Found available callback port");
                return Ok(port);
            }
            Err(_) => continue,
        }
    }

    Err(AuthError::NoAvailablePort { start_port })
}
