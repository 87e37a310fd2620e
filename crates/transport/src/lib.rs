pub mod client;
pub mod config;
pub mod envelope;
pub mod pool;
pub mod smtp;

pub use client::{TransportClient, TransportReceipt};
pub use config::SmtpConfig;
pub use envelope::{Envelope, PRIORITY_HEADER};
pub use pool::{ConnectionPool, PooledClient, StaticConnectionPool};
pub use smtp::SmtpClient;
