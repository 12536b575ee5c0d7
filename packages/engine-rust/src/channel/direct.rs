//! Push-based channel delivering into subscriber callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use switchyard_core::{DeliveryError, Message, MessageChannel, MessageHandler};

/// Subscribable channel: delivery is a sequential call into every
/// subscriber, on the sender's task. Zero subscribers is not an error; the
/// message is simply dropped.
pub struct SubscribableChannel {
    name: String,
    subscribers: RwLock<Vec<Arc<dyn MessageHandler>>>,
}

impl SubscribableChannel {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Add a subscriber. Subscribers are invoked in subscription order.
    pub fn subscribe(&self, handler: Arc<dyn MessageHandler>) {
        self.subscribers.write().push(handler);
    }

    /// Number of current subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[async_trait]
impl MessageChannel for SubscribableChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: Message) -> Result<(), DeliveryError> {
        // Snapshot under the lock; handlers run without it.
        let handlers: Vec<Arc<dyn MessageHandler>> = self.subscribers.read().clone();
        if handlers.is_empty() {
            tracing::debug!(channel = %self.name, message_id = %message.id(), "no subscribers, dropping");
            return Ok(());
        }
        for handler in handlers {
            handler.handle(message.clone()).await;
        }
        Ok(())
    }
}
