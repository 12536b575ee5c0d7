//! Channel and handler traits.
//!
//! A channel is a named destination with one of two capabilities: pollable
//! (buffered FIFO, callers pull with a timeout) or subscribable (push-based,
//! delivery calls into subscriber handlers). Implementations live in the
//! engine crate; the traits live here so header types can reference
//! destinations without depending on a runtime.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::message::Message;

/// A named message destination.
///
/// Used as `Arc<dyn MessageChannel>` everywhere a destination is held.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Name of this channel. Registry-owned channels are unique by name;
    /// anonymous channels (e.g. single-use reply slots) pick their own.
    fn name(&self) -> &str;

    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] when the message cannot be accepted.
    async fn send(&self, message: Message) -> Result<(), DeliveryError>;
}

impl std::fmt::Debug for dyn MessageChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageChannel")
            .field("name", &self.name())
            .finish()
    }
}

/// A buffered channel that consumers pull from.
#[async_trait]
pub trait PollableChannel: MessageChannel {
    /// Wait up to `timeout` for the next message. `None` means the deadline
    /// passed (or the channel closed) with nothing received.
    async fn receive(&self, timeout: Duration) -> Option<Message>;
}

/// Callback invoked for every message delivered to a subscribable channel.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one message. Failures are the handler's own concern; a
    /// handler that produces errors should emit them as error messages on
    /// the sender's `errorChannel`.
    async fn handle(&self, message: Message);
}
