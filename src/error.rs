//! Error types for the server core

use std::net::SocketAddr;
use thiserror::Error;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error types surfaced by the server core.
///
/// Only configuration and bind problems are surfaced synchronously, at
/// [`Server::listen`](crate::server::Server::listen) time. Steady-state
/// conditions — disconnects, send failures — are delivered via callbacks or
/// silently tolerated, never returned as errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Endpoint configuration errors (bad address, family mismatch)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Bind failure at listen time
    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: SocketAddr,
        source: std::io::Error,
    },

    /// Lifecycle state errors (e.g. listen on a closed server)
    #[error("Server state error: {message}")]
    State { message: String },
}

impl ServerError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        ServerError::Config {
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        ServerError::State {
            message: message.into(),
        }
    }

    /// Check if this error can be retried with corrected input.
    ///
    /// Bind and configuration failures leave the server Idle, so the caller
    /// may fix the configuration and call `listen()` again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServerError::Config { .. } | ServerError::Bind { .. })
    }
}
