use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use postilion_core::PoolError;

use crate::client::TransportClient;

/// A transport client leased from a pool.
///
/// The lease is held for exactly one send or validate call and returned
/// when the guard is dropped, regardless of the call's outcome.
#[derive(Debug)]
pub struct PooledClient {
    client: Arc<dyn TransportClient>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl PooledClient {
    /// Wrap a client without lease accounting. Useful for pools that do
    /// not bound concurrent leases, and for tests.
    pub fn detached(client: Arc<dyn TransportClient>) -> Self {
        Self {
            client,
            _permit: None,
        }
    }

    fn leased(client: Arc<dyn TransportClient>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            client,
            _permit: Some(permit),
        }
    }
}

impl Deref for PooledClient {
    type Target = dyn TransportClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

/// Supplies ready transport clients on demand.
///
/// `acquire` may suspend the caller while no connection is available.
/// Pool faults are not retried by the dispatch layer unless explicitly
/// reclassified through dispatcher configuration.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Lease a ready transport client.
    async fn acquire(&self) -> Result<PooledClient, PoolError>;
}

/// A fixed-size pool over a pre-built set of clients.
///
/// Clients are handed out round-robin; the number of simultaneously held
/// leases is bounded by the client count, so an `acquire` suspends until
/// an earlier lease is dropped.
pub struct StaticConnectionPool {
    clients: Vec<Arc<dyn TransportClient>>,
    cursor: AtomicUsize,
    semaphore: Arc<Semaphore>,
}

impl std::fmt::Debug for StaticConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticConnectionPool")
            .field("clients", &self.clients.len())
            .field("cursor", &self.cursor)
            .field("semaphore", &self.semaphore)
            .finish()
    }
}

impl StaticConnectionPool {
    /// Build a pool from the given clients.
    pub fn new(clients: Vec<Arc<dyn TransportClient>>) -> Result<Self, PoolError> {
        if clients.is_empty() {
            return Err(PoolError::Configuration(
                "pool requires at least one client".to_owned(),
            ));
        }
        let semaphore = Arc::new(Semaphore::new(clients.len()));
        Ok(Self {
            clients,
            cursor: AtomicUsize::new(0),
            semaphore,
        })
    }

    /// Number of clients in the pool.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ConnectionPool for StaticConnectionPool {
    async fn acquire(&self) -> Result<PooledClient, PoolError> {
        // Cancel-safe: dropping the future while waiting leaves the
        // permit count untouched.
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        Ok(PooledClient::leased(
            Arc::clone(&self.clients[index]),
            permit,
        ))
    }
}
