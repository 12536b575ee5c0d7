//! Routing by the payload's concrete runtime type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use switchyard_core::{Message, MessageChannel};

use super::{ChannelResolver, Resolution};

/// Resolves a destination by exact payload type — the concrete type only,
/// never a supertype or trait. Unmapped types resolve to nothing, leaving
/// the drop/default/fail decision to the router policy.
#[derive(Default)]
pub struct PayloadTypeResolver {
    channels: HashMap<TypeId, Arc<dyn MessageChannel>>,
}

impl PayloadTypeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map payloads of type `T` to `channel`.
    #[must_use]
    pub fn route_type<T: Any>(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.channels.insert(TypeId::of::<T>(), channel);
        self
    }
}

impl ChannelResolver for PayloadTypeResolver {
    fn resolve(&self, message: &Message) -> Resolution {
        let type_id = message.payload().as_ref().type_id();
        match self.channels.get(&type_id) {
            Some(channel) => Resolution::Channels(vec![Arc::clone(channel)]),
            None => Resolution::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use switchyard_core::PollableChannel;

    use super::*;
    use crate::channel::QueueChannel;
    use crate::router::{MessageRouter, RouterConfig};

    #[tokio::test]
    async fn routes_by_concrete_payload_type() {
        let strings = Arc::new(QueueChannel::new("strings", 8));
        let numbers = Arc::new(QueueChannel::new("numbers", 8));

        let resolver = PayloadTypeResolver::new()
            .route_type::<String>(Arc::clone(&strings) as Arc<dyn MessageChannel>)
            .route_type::<i64>(Arc::clone(&numbers) as Arc<dyn MessageChannel>);
        let router = MessageRouter::new(resolver, None, RouterConfig::default());

        router.dispatch(Message::with_payload("text".to_string())).await.unwrap();
        router.dispatch(Message::with_payload(7i64)).await.unwrap();

        assert!(strings.receive(Duration::from_millis(50)).await.is_some());
        assert!(numbers.receive(Duration::from_millis(50)).await.is_some());
    }

    #[tokio::test]
    async fn unmapped_type_falls_back_to_default() {
        let fallback = Arc::new(QueueChannel::new("fallback", 8));
        let router = MessageRouter::new(
            PayloadTypeResolver::new(),
            None,
            RouterConfig {
                resolution_required: false,
                default_output_channel: Some(Arc::clone(&fallback) as Arc<dyn MessageChannel>),
            },
        );

        router.dispatch(Message::with_payload(1.5f64)).await.unwrap();
        assert!(fallback.receive(Duration::from_millis(50)).await.is_some());
    }
}
