use async_trait::async_trait;
use postilion_core::DispatchError;

use crate::envelope::Envelope;

/// Result of one successful send through a transport client.
#[derive(Debug, Clone)]
pub struct TransportReceipt {
    /// Provider-assigned message identifier (if available).
    pub message_id: Option<String>,
    /// Serialized envelope size in bytes, as reported by the transport.
    pub size: usize,
}

/// A leased transport connection.
///
/// One call performs exactly one send or one connection-validation
/// attempt; the dispatch layer owns retry bounding and draws a fresh
/// client from the pool for every attempt.
///
/// Send failures classified as [`DispatchError::Transport`] are retryable;
/// anything else (an envelope that cannot be rendered, for instance)
/// propagates without retry.
#[async_trait]
pub trait TransportClient: Send + Sync + std::fmt::Debug {
    /// Perform one delivery attempt for the envelope.
    async fn send(&self, envelope: &Envelope) -> Result<TransportReceipt, DispatchError>;

    /// Check whether the underlying connection is usable.
    async fn validate_connection(&self) -> Result<bool, DispatchError>;

    /// Transport name for diagnostics (e.g. `"smtp"`).
    fn transport_name(&self) -> &'static str;
}
