//! Static broadcast routing to a pre-validated recipient list.

use std::sync::Arc;

use switchyard_core::{Message, MessageChannel};

use super::{ChannelResolver, MessageRouter, Resolution, RouterConfig};
use crate::channel::ChannelRegistry;
use crate::error::ConfigurationError;

/// Resolver holding the validated, fixed recipient set.
struct StaticRecipients {
    channels: Vec<Arc<dyn MessageChannel>>,
}

impl ChannelResolver for StaticRecipients {
    fn resolve(&self, _message: &Message) -> Resolution {
        Resolution::Channels(self.channels.clone())
    }
}

impl MessageRouter {
    /// Router broadcasting every message to a fixed recipient list.
    ///
    /// Exactly one of `channels` or `names` must be non-empty; names are
    /// resolved against the registry here, at setup, so a bad name can
    /// never surface at message time.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::RecipientListConflict`] when both sources are
    /// given, [`ConfigurationError::RecipientListEmpty`] when neither is,
    /// and [`ConfigurationError::UnknownRecipient`] for an unregistered
    /// name.
    pub fn recipient_list(
        channels: Vec<Arc<dyn MessageChannel>>,
        names: Vec<String>,
        registry: Option<Arc<ChannelRegistry>>,
        config: RouterConfig,
    ) -> Result<Self, ConfigurationError> {
        let recipients = match (channels.is_empty(), names.is_empty()) {
            (false, false) => return Err(ConfigurationError::RecipientListConflict),
            (true, true) => return Err(ConfigurationError::RecipientListEmpty),
            (false, true) => channels,
            (true, false) => {
                let mut resolved = Vec::with_capacity(names.len());
                for name in names {
                    let channel = registry
                        .as_ref()
                        .and_then(|r| r.resolve(&name).ok())
                        .ok_or(ConfigurationError::UnknownRecipient { name })?;
                    resolved.push(channel);
                }
                resolved
            }
        };
        Ok(Self::new(
            StaticRecipients {
                channels: recipients,
            },
            None,
            config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use switchyard_core::PollableChannel;

    use super::*;
    use crate::channel::QueueChannel;

    #[tokio::test]
    async fn names_are_validated_at_setup() {
        let registry = Arc::new(ChannelRegistry::new());
        registry.register(Arc::new(QueueChannel::new("alpha", 8)));

        let err = MessageRouter::recipient_list(
            Vec::new(),
            vec!["alpha".to_string(), "missing".to_string()],
            Some(Arc::clone(&registry)),
            RouterConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownRecipient { name } if name == "missing"));
    }

    #[tokio::test]
    async fn name_list_broadcasts_after_validation() {
        let registry = Arc::new(ChannelRegistry::new());
        let alpha = Arc::new(QueueChannel::new("alpha", 8));
        let beta = Arc::new(QueueChannel::new("beta", 8));
        registry.register(Arc::clone(&alpha) as Arc<dyn MessageChannel>);
        registry.register(Arc::clone(&beta) as Arc<dyn MessageChannel>);

        let router = MessageRouter::recipient_list(
            Vec::new(),
            vec!["alpha".to_string(), "beta".to_string()],
            Some(registry),
            RouterConfig::default(),
        )
        .unwrap();

        router.dispatch(Message::with_payload(0i64)).await.unwrap();
        assert!(alpha.receive(Duration::from_millis(50)).await.is_some());
        assert!(beta.receive(Duration::from_millis(50)).await.is_some());
    }
}
