//! Switchyard Core — message envelope, headers, channel traits, and message groups.

pub mod channel;
pub mod error;
pub mod group;
pub mod headers;
pub mod message;

pub use channel::{MessageChannel, MessageHandler, PollableChannel};
pub use error::DeliveryError;
pub use group::MessageGroup;
pub use headers::{ChannelAddress, CorrelationId, HeaderValue};
pub use message::{ErrorPayload, Message, MessageBuilder, Payload};
