//! CLI command implementations.

mod auth;

pub use auth::{login, logout, status};
