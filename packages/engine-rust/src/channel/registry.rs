//! Name-to-channel registry.

use std::sync::Arc;

use dashmap::DashMap;
use switchyard_core::MessageChannel;

use crate::error::RoutingError;

/// Explicit, passed-in channel registry: name -> channel instance.
///
/// There is no ambient lookup; every component that resolves names holds a
/// handle to the registry it was constructed with. Each name owns at most
/// one channel; re-registering a name replaces the previous entry.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<dyn MessageChannel>>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Register a channel under its own name.
    pub fn register(&self, channel: Arc<dyn MessageChannel>) {
        self.channels.insert(channel.name().to_string(), channel);
    }

    /// Register a channel under an explicit name (aliasing is allowed).
    pub fn register_as(&self, name: impl Into<String>, channel: Arc<dyn MessageChannel>) {
        self.channels.insert(name.into(), channel);
    }

    /// Look up a channel by name.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::UnknownChannel`] when nothing is registered
    /// under `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn MessageChannel>, RoutingError> {
        self.channels
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RoutingError::UnknownChannel {
                name: name.to_string(),
            })
    }

    /// Whether a channel is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::QueueChannel;

    #[test]
    fn resolve_returns_registered_channel() {
        let registry = ChannelRegistry::new();
        registry.register(Arc::new(QueueChannel::new("orders", 8)));

        let channel = registry.resolve("orders").unwrap();
        assert_eq!(channel.name(), "orders");
    }

    #[test]
    fn resolve_unknown_name_fails() {
        let registry = ChannelRegistry::new();
        let err = registry.resolve("nowhere").unwrap_err();
        assert!(matches!(err, RoutingError::UnknownChannel { name } if name == "nowhere"));
    }

    #[test]
    fn register_as_aliases_a_channel() {
        let registry = ChannelRegistry::new();
        registry.register_as("alias", Arc::new(QueueChannel::new("orders", 8)));
        assert!(registry.contains("alias"));
        assert!(!registry.contains("orders"));
    }
}
