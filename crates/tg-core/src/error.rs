//! Error types for Tunnelgate
//!
//! Provides a unified error handling strategy using thiserror.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for Tunnelgate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Unified error type for all Tunnelgate operations
///
/// Rejected logins and invalid session cookies are not errors: the gateway
/// answers them with a redirect or the login page.
#[derive(Error, Debug)]
pub enum GateError {
    // ─────────────────────────────────────────────────────────────
    // Gateway Construction Errors
    // ─────────────────────────────────────────────────────────────
    #[error("No free port in range {start}-{end}")]
    PortAllocationFailed { start: u16, end: u16 },

    #[error("Invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("Invalid gateway configuration: {0}")]
    InvalidConfig(String),

    // ─────────────────────────────────────────────────────────────
    // Lifecycle Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Gateway already started")]
    AlreadyStarted,

    #[error("Graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    // ─────────────────────────────────────────────────────────────
    // Configuration File Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Whether the owning process may keep going after this error.
    ///
    /// Only teardown problems qualify; everything else aborts the route.
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, GateError::ShutdownTimeout(_))
    }
}

impl From<toml::de::Error> for GateError {
    fn from(err: toml::de::Error) -> Self {
        GateError::ConfigError(err.to_string())
    }
}

impl From<toml::ser::Error> for GateError {
    fn from(err: toml::ser::Error) -> Self {
        GateError::ConfigError(err.to_string())
    }
}

impl From<hex::FromHexError> for GateError {
    fn from(err: hex::FromHexError) -> Self {
        GateError::InvalidSigningKey(err.to_string())
    }
}
