//! Authentication engine for the Fillway CLI.
//!
//! This crate provides:
//! - A local HTTP callback server with CSRF validation for browser sign-in
//! - A sequential free-port probe to host it on
//! - An explicit FSM-based auth session (sign-in, validate, logout, reset)
//! - The remote auth API client for code exchange and session verification
//! - The auth error taxonomy and its telemetry reporting path

mod api;
mod auth_fsm;
mod callback;
mod error;
mod port;
mod session;

pub use api::{AuthApi, ExchangedSession, HttpAuthApi, UserRecord, VerifiedSession};
pub use auth_fsm::session_machine;
pub use auth_fsm::{AuthState, SessionMachine, SessionMachineInput, SessionMachineState};
pub use callback::CallbackServer;
pub use error::{report_auth_error, AuthError, AuthResult, CallbackFailure};
pub use port::{find_available_port, DEFAULT_CALLBACK_PORT};
pub use session::{AuthSession, SessionOptions, SessionSnapshot, DEFAULT_CALLBACK_TIMEOUT};
