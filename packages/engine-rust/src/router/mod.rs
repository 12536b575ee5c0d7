//! Message routing: pure destination decisions plus fan-out dispatch.
//!
//! A [`MessageRouter`] pairs a pluggable [`ChannelResolver`] with the
//! routing policy flags. Resolvers come from a small closed set (by-name,
//! by-instance, payload-type, recipient-list, error-type, reply-header) —
//! plain data and closures, no reflection.

mod error_type;
mod payload_type;
mod recipient_list;

use std::sync::Arc;

use switchyard_core::{ChannelAddress, Message, MessageChannel};

pub use error_type::ErrorTypeResolver;
pub use payload_type::PayloadTypeResolver;

use crate::channel::ChannelRegistry;
use crate::error::RoutingError;

// ---------------------------------------------------------------------------
// Resolution & resolver
// ---------------------------------------------------------------------------

/// What a resolver produced for one message: channel handles, registry
/// names, or nothing.
pub enum Resolution {
    Channels(Vec<Arc<dyn MessageChannel>>),
    Names(Vec<String>),
}

impl Resolution {
    /// An empty resolution (message matches no destination).
    #[must_use]
    pub fn none() -> Self {
        Self::Channels(Vec::new())
    }
}

/// Decides destination channels (or names) for a message. Pure: resolvers
/// never send, so routing the same message twice yields the same set.
pub trait ChannelResolver: Send + Sync {
    fn resolve(&self, message: &Message) -> Resolution;
}

impl<F> ChannelResolver for F
where
    F: Fn(&Message) -> Resolution + Send + Sync,
{
    fn resolve(&self, message: &Message) -> Resolution {
        self(message)
    }
}

// ---------------------------------------------------------------------------
// RouterConfig
// ---------------------------------------------------------------------------

/// Routing policy flags, evaluated after resolution.
#[derive(Clone, Default)]
pub struct RouterConfig {
    /// When set, an empty resolution (after the default channel is
    /// considered) is an error instead of a silent drop.
    pub resolution_required: bool,
    /// Fallback destination when resolution is empty. A non-empty
    /// resolution always wins over the default.
    pub default_output_channel: Option<Arc<dyn MessageChannel>>,
}

// ---------------------------------------------------------------------------
// MessageRouter
// ---------------------------------------------------------------------------

/// Routes messages to zero, one, or many destination channels.
pub struct MessageRouter {
    resolver: Box<dyn ChannelResolver>,
    registry: Option<Arc<ChannelRegistry>>,
    config: RouterConfig,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter").finish_non_exhaustive()
    }
}

impl MessageRouter {
    /// Build a router from any resolver. Name resolutions require a
    /// registry; pass `None` for instance-only resolvers.
    pub fn new(
        resolver: impl ChannelResolver + 'static,
        registry: Option<Arc<ChannelRegistry>>,
        config: RouterConfig,
    ) -> Self {
        Self {
            resolver: Box::new(resolver),
            registry,
            config,
        }
    }

    /// Router resolving channel names via a closure and the registry.
    pub fn by_name(
        resolve: impl Fn(&Message) -> Vec<String> + Send + Sync + 'static,
        registry: Arc<ChannelRegistry>,
        config: RouterConfig,
    ) -> Self {
        Self::new(
            move |message: &Message| Resolution::Names(resolve(message)),
            Some(registry),
            config,
        )
    }

    /// Router resolving channel handles directly via a closure.
    pub fn by_instance(
        resolve: impl Fn(&Message) -> Vec<Arc<dyn MessageChannel>> + Send + Sync + 'static,
        config: RouterConfig,
    ) -> Self {
        Self::new(
            move |message: &Message| Resolution::Channels(resolve(message)),
            None,
            config,
        )
    }

    /// Router resolving each message's own `replyChannel` header. This is
    /// the outbound path of the release engine: aggregated and resequenced
    /// messages carry their destination with them.
    pub fn reply_channel(registry: Option<Arc<ChannelRegistry>>, config: RouterConfig) -> Self {
        Self::new(
            |message: &Message| match message.reply_channel() {
                Some(ChannelAddress::Instance(channel)) => {
                    Resolution::Channels(vec![Arc::clone(channel)])
                }
                Some(ChannelAddress::Name(name)) => Resolution::Names(vec![name.clone()]),
                None => Resolution::none(),
            },
            registry,
            config,
        )
    }

    /// Decide the destination set for a message without sending.
    ///
    /// # Errors
    ///
    /// [`RoutingError::UnknownChannel`] when a resolved name is missing from
    /// the registry and resolution is required;
    /// [`RoutingError::DestinationResolution`] when nothing resolves, no
    /// default channel is set, and resolution is required.
    pub fn route(&self, message: &Message) -> Result<Vec<Arc<dyn MessageChannel>>, RoutingError> {
        let resolved = match self.resolver.resolve(message) {
            Resolution::Channels(channels) => channels,
            Resolution::Names(names) => self.lookup(names)?,
        };

        if !resolved.is_empty() {
            return Ok(resolved);
        }
        if let Some(default) = &self.config.default_output_channel {
            return Ok(vec![Arc::clone(default)]);
        }
        if self.config.resolution_required {
            return Err(RoutingError::DestinationResolution {
                message_id: message.id(),
            });
        }
        Ok(Vec::new())
    }

    /// Route and send. Each send is independent: a failure on one
    /// destination never suppresses the attempts on the others, but any
    /// failure surfaces as [`RoutingError::Delivery`] once all destinations
    /// have been tried. Returns the number of successful deliveries; 0 with
    /// `Ok` means the message was silently dropped.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::route`] errors, plus `Delivery` on send failures.
    pub async fn dispatch(&self, message: Message) -> Result<usize, RoutingError> {
        let channels = self.route(&message)?;
        if channels.is_empty() {
            tracing::debug!(message_id = %message.id(), "no destination, dropping");
            return Ok(0);
        }

        let attempted = channels.len();
        let mut failures = Vec::new();
        for channel in &channels {
            if let Err(err) = channel.send(message.clone()).await {
                tracing::warn!(
                    message_id = %message.id(),
                    channel = channel.name(),
                    %err,
                    "delivery failed",
                );
                failures.push(err);
            }
        }

        if failures.is_empty() {
            Ok(attempted)
        } else {
            Err(RoutingError::Delivery {
                attempted,
                failures,
            })
        }
    }

    fn lookup(&self, names: Vec<String>) -> Result<Vec<Arc<dyn MessageChannel>>, RoutingError> {
        let mut channels = Vec::with_capacity(names.len());
        for name in names {
            let looked_up = self
                .registry
                .as_ref()
                .map_or_else(
                    || Err(RoutingError::UnknownChannel { name: name.clone() }),
                    |registry| registry.resolve(&name),
                );
            match looked_up {
                Ok(channel) => channels.push(channel),
                Err(err) => {
                    if self.config.resolution_required {
                        return Err(err);
                    }
                    tracing::warn!(channel = %name, "unknown channel name skipped");
                }
            }
        }
        Ok(channels)
    }
}
