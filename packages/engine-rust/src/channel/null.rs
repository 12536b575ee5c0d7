//! Channel that accepts and discards everything.

use async_trait::async_trait;
use switchyard_core::{DeliveryError, Message, MessageChannel};

/// The default discard destination: every send succeeds and the message is
/// dropped.
#[derive(Debug, Default)]
pub struct NullChannel;

#[async_trait]
impl MessageChannel for NullChannel {
    fn name(&self) -> &str {
        "null"
    }

    async fn send(&self, message: Message) -> Result<(), DeliveryError> {
        tracing::debug!(message_id = %message.id(), "discarded by null channel");
        Ok(())
    }
}
