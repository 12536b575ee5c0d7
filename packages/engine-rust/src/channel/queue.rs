//! Bounded FIFO channel backed by a tokio mpsc pair.

use std::time::Duration;

use async_trait::async_trait;
use switchyard_core::{DeliveryError, Message, MessageChannel, PollableChannel};
use tokio::sync::mpsc;

/// Buffered point-to-point channel. Sends never block: a full buffer is a
/// delivery failure the sender must handle, so fan-out routers can report it
/// per destination instead of stalling.
pub struct QueueChannel {
    name: String,
    tx: mpsc::Sender<Message>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Message>>,
}

impl QueueChannel {
    /// Create a queue channel with the given buffer capacity.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            name: name.into(),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Number of messages currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageChannel for QueueChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: Message) -> Result<(), DeliveryError> {
        self.tx.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full(self.name.clone()),
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed(self.name.clone()),
        })
    }
}

#[async_trait]
impl PollableChannel for QueueChannel {
    async fn receive(&self, timeout: Duration) -> Option<Message> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_then_receive_in_fifo_order() {
        let channel = QueueChannel::new("orders", 8);
        channel.send(Message::with_payload(1i64)).await.unwrap();
        channel.send(Message::with_payload(2i64)).await.unwrap();

        let first = channel.receive(Duration::from_millis(50)).await.unwrap();
        let second = channel.receive(Duration::from_millis(50)).await.unwrap();
        assert_eq!(first.payload_as::<i64>(), Some(&1));
        assert_eq!(second.payload_as::<i64>(), Some(&2));
    }

    #[tokio::test]
    async fn receive_times_out_on_empty_channel() {
        let channel = QueueChannel::new("empty", 4);
        let received = channel.receive(Duration::from_millis(10)).await;
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn full_buffer_is_a_delivery_failure() {
        let channel = QueueChannel::new("tiny", 1);
        channel.send(Message::with_payload(())).await.unwrap();

        let err = channel.send(Message::with_payload(())).await.unwrap_err();
        assert_eq!(err, DeliveryError::Full("tiny".to_string()));
    }
}
