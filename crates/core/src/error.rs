use std::time::Duration;

use thiserror::Error;

/// A classified, retryable fault reported by a transport client during a
/// send or connection-validation call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection to the transport endpoint failed or was dropped.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote endpoint rejected the operation at the protocol level.
    #[error("protocol rejection: {0}")]
    Rejected(String),

    /// The transport call did not complete within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// TLS negotiation with the transport endpoint failed.
    #[error("TLS error: {0}")]
    Tls(String),
}

/// A fault acquiring a connection from the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No connection became available.
    #[error("connection pool exhausted")]
    Exhausted,

    /// The pool has been shut down.
    #[error("connection pool closed")]
    Closed,

    /// The pool was built from invalid configuration.
    #[error("invalid pool configuration: {0}")]
    Configuration(String),
}

/// Errors surfaced by the dispatch pipeline.
///
/// Only the transport class is retryable; every other variant propagates
/// on first occurrence.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A transport failure. Retried up to the configured policy bound.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A connection pool failure.
    #[error("pool failure: {0}")]
    Pool(#[from] PoolError),

    /// Invalid retry or dispatcher configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The message could not be rendered into a transport envelope.
    #[error("invalid message: {0}")]
    Message(String),

    /// The dispatch was cancelled before completion.
    #[error("dispatch cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Returns `true` if the failure is transient and the operation may
    /// succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
