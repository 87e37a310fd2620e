pub mod error;
pub mod message;
pub mod result;

pub use error::{DispatchError, PoolError, TransportError};
pub use message::{MessageAttachment, MessageContentType, MessagePriority, OutboundMessage};
pub use result::{DispatchResult, STAT_SENDING_TIME, STAT_SIZE};
