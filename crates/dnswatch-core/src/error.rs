//! Error types for the DNS monitoring system
//!
//! This module defines all error types used throughout the crate.
//!
//! Two DNS-level conditions are deliberately NOT errors: a DoH response
//! with `Status != 0` and the "No Reachable Authority" signal. Both are
//! carried in-band on `ResolveResult` and interpreted by the observer.

use thiserror::Error;

/// Result type alias for monitoring operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNS monitoring system
#[derive(Error, Debug)]
pub enum Error {
    /// Resolver-related errors (DoH transport, response parsing)
    #[error("resolver error: {0}")]
    Resolver(String),

    /// Notifier-related errors (webhook transport)
    #[error("notifier error: {0}")]
    Notifier(String),

    /// Store-related errors
    #[error("store error: {0}")]
    Store(String),

    /// Stored value exists but cannot be decoded
    #[error("integrity error for key {key}: {message}")]
    Integrity {
        /// The store key holding the corrupt value
        key: String,
        /// What failed to decode
        message: String,
    },

    /// Rejected input from the command surface
    #[error("invalid domain name: {0}")]
    Validation(String),

    /// Outbound call exceeded its deadline
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a resolver error
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Create a notifier error
    pub fn notifier(msg: impl Into<String>) -> Self {
        Self::Notifier(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an integrity error for a corrupt stored value
    pub fn integrity(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Integrity {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors the observer recovers from in place: emit an
    /// error notification, skip state mutation, continue with the next
    /// domain.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Resolver(_) | Self::Notifier(_) | Self::Network(_) | Self::Timeout(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
