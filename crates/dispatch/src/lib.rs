pub mod config;
pub mod dispatcher;

pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
