//! Bawwab Core Library
//!
//! Configuration, error taxonomy, secret resolution, and shared
//! request-scoped types for the bawwab LDAP authentication gate.

pub mod config;
pub mod error;
pub mod secrets;
pub mod types;

pub use config::BawwabConfig;
pub use error::{Error, Result};
pub use secrets::SecretResolver;

/// Bawwab version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP listen port for the gate daemon
pub const DEFAULT_GATE_PORT: u16 = 4180;

/// Default directory port (plain LDAP)
pub const DEFAULT_DIRECTORY_PORT: u16 = 389;

/// Default directory connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default session lifetime in seconds
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 300;
