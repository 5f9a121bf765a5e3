//! Error types for the callback-server crate.

use std::net::SocketAddr;

/// Errors that can occur while running the callback server.
#[derive(Debug, thiserror::Error)]
pub enum CallbackServerError {
    /// The listener could not be bound
    #[error("Failed to bind callback server to {addr}: {source}")]
    Bind {
        /// The address that was requested
        addr: SocketAddr,
        #[source]
        source: warp::Error,
    },

    /// The server task panicked or was aborted
    #[error("Callback server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Convenience type alias for Results using CallbackServerError.
pub type Result<T> = std::result::Result<T, CallbackServerError>;
