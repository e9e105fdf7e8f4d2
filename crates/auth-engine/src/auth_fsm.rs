//! Session state machine using rust-fsm.
//!
//! An explicit finite state machine for the auth session, instead of
//! deriving state from storage checks or ad-hoc booleans.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │    SignedOut    │ (initial)
//! └────────┬────────┘
//!          │ SignInAttempt / ValidateSession
//!          ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │    SigningIn    │     │   Validating    │
//! └────────┬────────┘     └────────┬────────┘
//!          │ SignInSuccess         │ SessionValid
//!          │ SignInFailed          │ SessionInvalid
//!          ▼                       ▼
//! ┌─────────────────┐      SignedIn / SignedOut
//! │    SignedIn     │
//! └────────┬────────┘
//!          │ SignOut
//!          ▼
//!      SignedOut
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Define the FSM using rust-fsm's declarative macro
// This generates a module `session_machine` with:
// - session_machine::State (enum)
// - session_machine::Input (enum)
// - session_machine::StateMachine (type alias)
// - session_machine::Impl (trait impl)
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(SignedOut)

    SignedOut => {
        ValidateSession => Validating,
        SignInAttempt => SigningIn
    },
    Validating => {
        SessionValid => SignedIn,
        SessionInvalid => SignedOut
    },
    SigningIn => {
        SignInSuccess => SignedIn,
        SignInFailed => SignedOut
    },
    SignedIn => {
        ValidateSession => Validating,
        SignOut => SignedOut
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Simplified session state for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No session.
    SignedOut,
    /// Checking persisted credentials against the server.
    Validating,
    /// Browser sign-in flow in flight.
    SigningIn,
    /// Signed in with a verified session.
    SignedIn,
}

impl AuthState {
    /// Returns true only for a fully established session.
    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthState::SignedIn)
    }

    /// Returns true if the state is a transient/in-progress state.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthState::Validating | AuthState::SigningIn)
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::SignedOut => AuthState::SignedOut,
            SessionMachineState::Validating => AuthState::Validating,
            SessionMachineState::SigningIn => AuthState::SigningIn,
            SessionMachineState::SignedIn => AuthState::SignedIn,
        }
    }
}
