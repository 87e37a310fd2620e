use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use postilion_core::{
    DispatchError, DispatchResult, OutboundMessage, STAT_SENDING_TIME, STAT_SIZE,
};
use postilion_executor::RetryPolicy;
use postilion_transport::{ConnectionPool, Envelope, TransportReceipt};

use crate::config::DispatcherConfig;

/// Dispatches outbound messages over pooled transport connections with a
/// bounded, logged retry loop.
///
/// The dispatcher owns an explicit attempt loop rather than delegating to
/// [`RetryExecutor`](postilion_executor::RetryExecutor): every attempt
/// must draw a fresh connection from the pool, while the generic executor
/// re-invokes one fixed operation. Both share the same policy and
/// log-format contract.
///
/// The send path surfaces terminal failures as errors; the validation
/// path signals terminal failure with a `false` return instead. Callers
/// branch on that difference, so the two contracts are kept distinct.
pub struct Dispatcher {
    pool: Arc<dyn ConnectionPool>,
    policy: RetryPolicy,
    return_path: String,
    retry_pool_failures: bool,
    cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("policy", &self.policy)
            .field("return_path", &self.return_path)
            .field("retry_pool_failures", &self.retry_pool_failures)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher over the given pool.
    ///
    /// Fails fast with [`DispatchError::Configuration`] when the config's
    /// retry settings are invalid.
    pub fn new(
        pool: Arc<dyn ConnectionPool>,
        config: DispatcherConfig,
    ) -> Result<Self, DispatchError> {
        let policy = config.retry_policy()?;
        Ok(Self {
            pool,
            policy,
            return_path: config.return_path,
            retry_pool_failures: config.retry_pool_failures,
            cancellation: None,
        })
    }

    /// Attach a cancellation token checked at every suspension point.
    ///
    /// Without a token a dispatch runs to success or exhaustion.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The retry policy governing both dispatch paths.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send a message, retrying transport failures up to the policy bound.
    ///
    /// The envelope is built once per call and stamped with the configured
    /// return path; each attempt leases a fresh connection from the pool.
    /// On success the result carries the attempt's elapsed milliseconds
    /// and the serialized envelope size as statistics.
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    pub async fn send_email(
        &self,
        message: &OutboundMessage,
    ) -> Result<DispatchResult, DispatchError> {
        let mut envelope = Envelope::from_message(message);
        envelope.set_return_path(&self.return_path);

        for attempt in 1..=self.policy.max_attempts() {
            self.check_cancelled()?;
            let started = Instant::now();

            match self.attempt_send(&envelope).await {
                Ok(receipt) => {
                    debug!(attempt, size = receipt.size, "message dispatched");
                    let mut result = DispatchResult::new();
                    result.record(
                        STAT_SENDING_TIME,
                        started.elapsed().as_millis().to_string(),
                    );
                    result.record(STAT_SIZE, receipt.size.to_string());
                    return Ok(result);
                }
                Err(err) => {
                    if !self.is_retryable(&err) || self.policy.is_final(attempt) {
                        return Err(err);
                    }
                    info!(
                        attempt,
                        max_attempts = self.policy.max_attempts(),
                        error = %err,
                        "send failed, retrying"
                    );
                    self.rest_between_attempts().await?;
                }
            }
        }

        // Reachable only with a zero attempt bound, which construction
        // rejects.
        Err(DispatchError::Configuration(
            "retry policy allows zero attempts".to_owned(),
        ))
    }

    /// Check that a transport connection can be established.
    ///
    /// Returns `true` as soon as one leased connection validates. Returns
    /// `false` after the policy bound is exhausted; this path never
    /// surfaces an error, and acquisition or validation faults count as
    /// failed attempts.
    #[instrument(skip(self))]
    pub async fn validate_dispatch(&self) -> bool {
        for attempt in 1..=self.policy.max_attempts() {
            if self.check_cancelled().is_err() {
                return false;
            }

            let healthy = match self.attempt_validate().await {
                Ok(healthy) => healthy,
                Err(err) => {
                    debug!(attempt, error = %err, "validation attempt failed");
                    false
                }
            };

            if healthy {
                return true;
            }
            if self.policy.is_final(attempt) {
                return false;
            }
            info!(
                attempt,
                max_attempts = self.policy.max_attempts(),
                "connection validation failed, retrying"
            );
            if self.rest_between_attempts().await.is_err() {
                return false;
            }
        }

        false
    }

    /// One delivery attempt: lease a connection, send, release the lease.
    async fn attempt_send(&self, envelope: &Envelope) -> Result<TransportReceipt, DispatchError> {
        let client = self.pool.acquire().await?;
        client.send(envelope).await
    }

    /// One validation attempt: lease a connection, probe, release.
    async fn attempt_validate(&self) -> Result<bool, DispatchError> {
        let client = self.pool.acquire().await?;
        client.validate_connection().await
    }

    fn is_retryable(&self, err: &DispatchError) -> bool {
        err.is_retryable()
            || (self.retry_pool_failures && matches!(err, DispatchError::Pool(_)))
    }

    fn check_cancelled(&self) -> Result<(), DispatchError> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(DispatchError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Cooperative inter-attempt delay, cut short by cancellation.
    async fn rest_between_attempts(&self) -> Result<(), DispatchError> {
        let delay = self.policy.delay();
        match &self.cancellation {
            Some(token) => tokio::select! {
                () = token.cancelled() => Err(DispatchError::Cancelled),
                () = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}
