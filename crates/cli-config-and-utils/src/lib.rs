//! Core types, configuration, and utilities for the Fillway CLI.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, CredentialStoreKind, DEFAULT_API_URL, DEFAULT_CALLBACK_TIMEOUT_SECS,
    DEFAULT_LOG_LEVEL, DEFAULT_WEB_APP_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
