//! Single-use reply destination for one request/reply exchange.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use switchyard_core::{DeliveryError, Message, MessageChannel};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Private one-slot destination created for exactly one outbound request.
///
/// The first send resolves the paired receiver; any further send fails with
/// [`DeliveryError::AlreadyConsumed`]. Slots are never pooled or reused, so
/// unrelated exchanges can never cross-talk.
pub struct ReplySlot {
    name: String,
    tx: Mutex<Option<oneshot::Sender<Message>>>,
}

impl ReplySlot {
    /// Create a slot and the receiver that resolves with its reply.
    #[must_use]
    pub fn new() -> (Arc<Self>, oneshot::Receiver<Message>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Self {
            name: format!("reply-{}", Uuid::new_v4()),
            tx: Mutex::new(Some(tx)),
        });
        (slot, rx)
    }
}

#[async_trait]
impl MessageChannel for ReplySlot {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: Message) -> Result<(), DeliveryError> {
        let sender = self
            .tx
            .lock()
            .take()
            .ok_or_else(|| DeliveryError::AlreadyConsumed(self.name.clone()))?;
        sender
            .send(message)
            .map_err(|_| DeliveryError::Closed(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_send_resolves_receiver() {
        let (slot, rx) = ReplySlot::new();
        slot.send(Message::with_payload("ok".to_string())).await.unwrap();

        let reply = rx.await.unwrap();
        assert_eq!(reply.payload_as::<String>().map(String::as_str), Some("ok"));
    }

    #[tokio::test]
    async fn second_send_fails() {
        let (slot, _rx) = ReplySlot::new();
        slot.send(Message::with_payload(1i64)).await.unwrap();

        let err = slot.send(Message::with_payload(2i64)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::AlreadyConsumed(_)));
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_fails() {
        let (slot, rx) = ReplySlot::new();
        drop(rx);

        let err = slot.send(Message::with_payload(())).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Closed(_)));
    }
}
